//! Asynchronous name resolution
//!
//! A `Resolver` runs each lookup as a two-phase operation: the blocking
//! `getaddrinfo`/`getnameinfo` call happens on the resolver's private
//! offload thread, and the handler is delivered on the home scheduler
//! through the resolver's executor.
//!
//! Every operation carries a token from the resolver's current
//! `CancelSource`. `cancel()` trips that source and installs a fresh one,
//! so operations started afterwards are unaffected.

mod results;

pub use results::{ResolverEntry, ResolverResults};

use iosched_core::{CancelSource, CancelToken, IoResult, ResolveBackend, ResolveQuery};
use iosched_runtime::{AnyExecutor, Executor, OffloadOp, OffloadService, Scheduler};

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::system::SystemResolver;

pub struct Resolver {
    offload: OffloadService,
    backend: Arc<dyn ResolveBackend>,
    source: Mutex<CancelSource>,
    executor: AnyExecutor,
}

impl Resolver {
    /// Resolver for `home` using the operating system's resolver
    pub fn new(home: &Scheduler) -> Self {
        Self::with_backend(home, Arc::new(SystemResolver::new()))
    }

    /// Resolver for `home` using a specific backend
    pub fn with_backend(home: &Scheduler, backend: Arc<dyn ResolveBackend>) -> Self {
        Self {
            offload: OffloadService::new(home),
            backend,
            source: Mutex::new(CancelSource::new()),
            executor: AnyExecutor::new(home.executor()),
        }
    }

    /// Deliver handlers through `executor` instead of the home scheduler
    pub fn with_executor<E: Executor>(mut self, executor: E) -> Self {
        self.executor = AnyExecutor::new(executor);
        self
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        self.offload.home()
    }

    #[inline]
    pub fn executor(&self) -> &AnyExecutor {
        &self.executor
    }

    /// Token that the next operation will carry
    pub fn cancel_token(&self) -> CancelToken {
        self.source.lock().token()
    }

    /// Resolve a host and service to endpoints.
    ///
    /// `handler` runs exactly once with the results or the error. An `Err`
    /// return means the operation was not admitted and `handler` was dropped.
    pub fn async_resolve<H>(&self, query: ResolveQuery, handler: H) -> IoResult<()>
    where
        H: FnOnce(IoResult<ResolverResults>) + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        log::debug!("resolve {}:{}", query.host, query.service);
        OffloadOp::start(
            &self.offload,
            self.cancel_token(),
            move |token: &CancelToken| {
                let endpoints = backend.resolve(token, &query)?;
                let endpoints = endpoints.into_iter().filter(|ep| query.family.matches(ep)).collect();
                Ok(ResolverResults::from_endpoints(endpoints, &query.host, &query.service))
            },
            handler,
            self.executor.clone(),
        )
    }

    /// Resolve an endpoint to a host name and service name.
    ///
    /// On success the results hold one entry for `endpoint`.
    pub fn async_resolve_endpoint<H>(&self, endpoint: SocketAddr, handler: H) -> IoResult<()>
    where
        H: FnOnce(IoResult<ResolverResults>) + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        log::debug!("reverse resolve {}", endpoint);
        OffloadOp::start(
            &self.offload,
            self.cancel_token(),
            move |token: &CancelToken| {
                let info = backend.reverse(token, &endpoint)?;
                Ok(ResolverResults::single(ResolverEntry::new(endpoint, info.host, info.service)))
            },
            handler,
            self.executor.clone(),
        )
    }

    /// Cancel every operation started so far.
    ///
    /// Queued lookups complete with `Canceled` without calling the backend;
    /// a lookup already inside the backend may still deliver its result.
    pub fn cancel(&self) {
        let previous = std::mem::replace(&mut *self.source.lock(), CancelSource::new());
        previous.cancel();
        log::debug!("resolver canceled outstanding operations");
    }

    /// Cancel everything and stop the resolver's offload thread.
    ///
    /// Pending operations still complete (with `Canceled`) on the home
    /// scheduler; new operations fail with `ResourceExhausted`.
    pub fn shutdown(&self) {
        self.cancel();
        self.offload.shutdown();
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.shutdown();
    }
}
