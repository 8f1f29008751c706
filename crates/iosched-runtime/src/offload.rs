//! Blocking work offloaded to private worker threads
//!
//! An `OffloadService` owns a private scheduler and a small pool of
//! threads that run it. A two-phase [`OffloadOp`] is queued there first;
//! its completion entry point runs twice, and tells the phases apart by
//! comparing the owner it is handed with its home scheduler:
//!
//! ```text
//!  start_op ──> private queue ──> complete(Some(private))   blocking phase
//!                                   │  token set? -> Err(Canceled)
//!                                   │  else       -> run blocking call
//!                                   └─ home.post_deferred_completion(op)
//!
//!               home queue ────> complete(Some(home))       completion phase
//!                                   └─ free record, dispatch handler
//! ```
//!
//! The outstanding work on the home scheduler is counted once at
//! `start_op` and finished after the completion phase, so a thread in
//! `home.run()` keeps waiting while the blocking call is in flight.

use iosched_core::{BackendError, CancelToken, IoError, IoResult};

use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};

use crate::config::SchedulerConfig;
use crate::dispatcher::HandlerDispatcher;
use crate::executor::{Executor, IoExecutor};
use crate::operation::{OpPhase, Operation};
use crate::scheduler::Scheduler;
use crate::work::WorkGuard;
use crate::worker::WorkerPool;

struct WorkerState {
    work: Option<WorkGuard<IoExecutor>>,
    workers: Option<WorkerPool>,
    shut_down: bool,
}

/// Private scheduler plus worker threads for blocking phases
pub struct OffloadService {
    home: Scheduler,
    private: Scheduler,
    threads: usize,
    thread_name: String,
    state: Mutex<WorkerState>,
}

impl OffloadService {
    /// Create a service for operations completing on `home`.
    ///
    /// Threads are started on the first `start_op`.
    pub fn new(home: &Scheduler) -> Self {
        let config = home.config();
        let private = SchedulerConfig::from_env()
            .concurrency_hint(config.offload_threads)
            .max_outstanding(config.max_outstanding);
        Self {
            home: home.clone(),
            private: Scheduler::from_config(private),
            threads: config.offload_threads,
            thread_name: format!("{}-offload", config.thread_name),
            state: Mutex::new(WorkerState {
                work: None,
                workers: None,
                shut_down: false,
            }),
        }
    }

    #[inline]
    pub fn home(&self) -> &Scheduler {
        &self.home
    }

    /// The private scheduler blocking phases run on
    #[inline]
    pub fn private_scheduler(&self) -> &Scheduler {
        &self.private
    }

    fn ensure_started(&self) -> IoResult<()> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(IoError::ResourceExhausted("offload service shut down"));
        }
        if state.workers.is_some() {
            return Ok(());
        }

        let work = self.private.work_guard();
        match WorkerPool::start(&self.private, self.threads, &self.thread_name) {
            Ok(workers) => {
                log::debug!(
                    "offload for {} started {} threads on {}",
                    self.home.id(),
                    self.threads,
                    self.private.id()
                );
                state.work = Some(work);
                state.workers = Some(workers);
                Ok(())
            }
            Err(e) => {
                log::error!("offload threads unavailable: {}", e);
                drop(work);
                self.private.restart();
                Err(IoError::ResourceExhausted("offload worker threads"))
            }
        }
    }

    /// Admit `op` on the home scheduler and queue its blocking phase.
    ///
    /// On error nothing was queued and no work remains counted.
    pub fn start_op(&self, op: Box<dyn Operation>) -> IoResult<()> {
        self.home.try_work_started()?;
        if let Err(e) = self.ensure_started() {
            self.home.work_finished();
            return Err(e);
        }
        self.private.post_immediate_completion(op);
        Ok(())
    }

    /// Let every queued blocking phase run, then stop the threads.
    ///
    /// Operations started after this call fail with `ResourceExhausted`.
    pub fn shutdown(&self) {
        let (work, workers) = {
            let mut state = self.state.lock();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            (state.work.take(), state.workers.take())
        };

        drop(work);
        if let Some(mut workers) = workers {
            workers.join();
        }
        self.private.shutdown();
        log::debug!("offload for {} shut down", self.home.id());
    }
}

impl Drop for OffloadService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Two-phase operation running `work` off the home scheduler.
///
/// `work` receives the operation's cancellation token and is skipped
/// entirely if the token is already set when the blocking phase begins.
pub struct OffloadOp<W, T, H, E>
where
    E: Executor + Clone,
{
    work: Option<W>,
    token: CancelToken,
    home: Scheduler,
    dispatcher: HandlerDispatcher<H, E>,
    result: Option<IoResult<T>>,
    phase: OpPhase,
}

impl<W, T, H, E> OffloadOp<W, T, H, E>
where
    W: FnOnce(&CancelToken) -> IoResult<T> + Send + 'static,
    T: Send + 'static,
    H: FnOnce(IoResult<T>) + Send + 'static,
    E: Executor + Clone,
{
    pub fn new(home: &Scheduler, token: CancelToken, work: W, handler: H, executor: E) -> Box<Self> {
        Box::new(Self {
            work: Some(work),
            token,
            home: home.clone(),
            dispatcher: HandlerDispatcher::new(handler, executor, home),
            result: None,
            phase: OpPhase::Created,
        })
    }

    /// Build and start an operation on `service`
    pub fn start(service: &OffloadService, token: CancelToken, work: W, handler: H, executor: E) -> IoResult<()> {
        service.start_op(Self::new(service.home(), token, work, handler, executor))
    }

    fn run_blocking(mut self: Box<Self>) {
        self.phase.advance(OpPhase::Blocking);
        let result = match self.work.take() {
            Some(_) if self.token.is_canceled() => Err(IoError::Canceled),
            Some(work) => {
                let token = &self.token;
                // A panic is delivered to the handler as a backend failure.
                panic::catch_unwind(AssertUnwindSafe(|| work(token))).unwrap_or_else(|_| {
                    log::error!("offload work panicked");
                    Err(IoError::BackendFailure(BackendError::Panicked))
                })
            }
            None => Err(IoError::Canceled),
        };
        self.result = Some(result);
        self.phase.advance(OpPhase::ReadyForCompletion);

        let home = self.home.clone();
        home.post_deferred_completion(self);
    }

    fn run_completion(self: Box<Self>) {
        let mut this = *self;
        this.phase.advance(OpPhase::Completed);
        let OffloadOp { result, dispatcher, .. } = this;
        dispatcher.invoke(result.unwrap_or(Err(IoError::Canceled)));
    }
}

impl<W, T, H, E> Operation for OffloadOp<W, T, H, E>
where
    W: FnOnce(&CancelToken) -> IoResult<T> + Send + 'static,
    T: Send + 'static,
    H: FnOnce(IoResult<T>) + Send + 'static,
    E: Executor + Clone,
{
    fn complete(self: Box<Self>, owner: Option<&Scheduler>, _status: IoResult<()>, _bytes: usize) {
        match owner {
            Some(owner) if *owner != self.home => self.run_blocking(),
            Some(_) => self.run_completion(),
            None => {
                // Destroyed in the private queue: the home work it counted
                // is never going to be finished by a completion phase.
                if matches!(self.phase, OpPhase::Created | OpPhase::Blocking) {
                    self.home.work_finished();
                }
                log::debug!("offload op destroyed in phase {}", self.phase.name());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iosched_core::CancelSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_two_phase_completion() {
        let home = Scheduler::new();
        let service = OffloadService::new(&home);
        let (tx, rx) = mpsc::channel();
        let main = thread::current().id();

        OffloadOp::start(
            &service,
            CancelToken::never(),
            move |_: &CancelToken| Ok(thread::current().id()),
            move |r: IoResult<thread::ThreadId>| tx.send((r, thread::current().id())).unwrap(),
            home.executor(),
        )
        .unwrap();

        assert_eq!(home.outstanding_work(), 1);
        assert_eq!(home.run(), 1);

        let (blocking_thread, handler_thread) = rx.recv().unwrap();
        assert_ne!(blocking_thread.unwrap(), main);
        assert_eq!(handler_thread, main);
        assert_eq!(home.outstanding_work(), 0);
    }

    #[test]
    fn test_backend_error_delivered() {
        let home = Scheduler::new();
        let service = OffloadService::new(&home);
        let (tx, rx) = mpsc::channel();

        OffloadOp::start(
            &service,
            CancelToken::never(),
            |_: &CancelToken| Err::<(), _>(IoError::BackendFailure(BackendError::HostNotFound)),
            move |r| tx.send(r).unwrap(),
            home.executor(),
        )
        .unwrap();

        home.run();
        assert_eq!(
            rx.recv().unwrap(),
            Err(IoError::BackendFailure(BackendError::HostNotFound))
        );
    }

    #[test]
    fn test_panicking_work_completes_and_service_survives() {
        let home = Scheduler::new();
        let service = OffloadService::new(&home);
        let (tx, rx) = mpsc::channel();

        let tx1 = tx.clone();
        OffloadOp::start(
            &service,
            CancelToken::never(),
            |_: &CancelToken| -> IoResult<u32> { panic!("backend blew up") },
            move |r| tx1.send(r).unwrap(),
            home.executor(),
        )
        .unwrap();
        assert_eq!(home.run_for(Duration::from_secs(5)), 1);
        assert_eq!(
            rx.recv().unwrap(),
            Err(IoError::BackendFailure(BackendError::Panicked))
        );
        assert_eq!(home.outstanding_work(), 0);

        // Same offload thread keeps serving.
        home.restart();
        OffloadOp::start(
            &service,
            CancelToken::never(),
            |_: &CancelToken| Ok(9u32),
            move |r| tx.send(r).unwrap(),
            home.executor(),
        )
        .unwrap();
        assert_eq!(home.run_for(Duration::from_secs(5)), 1);
        assert_eq!(rx.recv().unwrap(), Ok(9));
    }

    #[test]
    fn test_canceled_before_blocking_phase_skips_work() {
        let home = Scheduler::new();
        let service = OffloadService::new(&home);
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CancelSource::new();
        source.cancel();

        let (tx, rx) = mpsc::channel();
        let c = Arc::clone(&calls);
        OffloadOp::start(
            &service,
            source.token(),
            move |_: &CancelToken| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            move |r| tx.send(r).unwrap(),
            home.executor(),
        )
        .unwrap();

        home.run();
        assert_eq!(rx.recv().unwrap(), Err(IoError::Canceled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_admission_refused() {
        let config = SchedulerConfig::from_env().max_outstanding(1);
        let home = Scheduler::with_config(config).unwrap();
        let service = OffloadService::new(&home);
        let _guard = home.work_guard();

        let result = OffloadOp::start(
            &service,
            CancelToken::never(),
            |_: &CancelToken| Ok(()),
            |_| {},
            home.executor(),
        );
        assert_eq!(result, Err(IoError::ResourceExhausted("outstanding operation limit")));
        assert_eq!(home.outstanding_work(), 1);
    }

    #[test]
    fn test_start_after_shutdown_refused() {
        let home = Scheduler::new();
        let service = OffloadService::new(&home);
        service.shutdown();

        let result = OffloadOp::start(
            &service,
            CancelToken::never(),
            |_: &CancelToken| Ok(()),
            |_| {},
            home.executor(),
        );
        assert!(matches!(result, Err(IoError::ResourceExhausted(_))));
        assert_eq!(home.outstanding_work(), 0);
    }

    #[test]
    fn test_shutdown_drains_blocking_phases() {
        let home = Scheduler::new();
        let service = OffloadService::new(&home);
        let (tx, rx) = mpsc::channel();

        for i in 0..4u32 {
            let tx = tx.clone();
            OffloadOp::start(
                &service,
                CancelToken::never(),
                move |_: &CancelToken| {
                    thread::sleep(Duration::from_millis(5));
                    Ok(i)
                },
                move |r| tx.send(r).unwrap(),
                home.executor(),
            )
            .unwrap();
        }

        service.shutdown();
        // Every blocking phase finished; completions wait on home.
        assert_eq!(home.queued(), 4);
        assert_eq!(home.run(), 4);

        let mut got: Vec<u32> = rx.try_iter().map(|r| r.unwrap()).collect();
        got.sort();
        assert_eq!(got, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_completion_on_foreign_executor() {
        let home = Scheduler::new();
        let foreign = Scheduler::new();
        let service = OffloadService::new(&home);
        let (tx, rx) = mpsc::channel();

        OffloadOp::start(
            &service,
            CancelToken::never(),
            |_: &CancelToken| Ok(7u8),
            move |r| tx.send(r).unwrap(),
            foreign.executor(),
        )
        .unwrap();

        // Dispatcher holds work on the foreign scheduler meanwhile.
        assert_eq!(foreign.outstanding_work(), 1);
        assert_eq!(home.run(), 1);
        assert!(rx.try_recv().is_err());

        assert_eq!(foreign.run(), 1);
        assert_eq!(rx.recv().unwrap(), Ok(7));
    }
}
