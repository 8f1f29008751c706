//! Handler delivery through a bound executor
//!
//! A `HandlerDispatcher` pairs a completion handler with the executor it
//! must run on. When that executor is not the operation's home scheduler,
//! the dispatcher holds outstanding work on the executor's context from
//! construction until the handler has been handed over, so the foreign
//! `run` loop cannot exit while the result is in flight.

use crate::executor::{Executor, Target};
use crate::scheduler::Scheduler;
use crate::work::WorkGuard;

pub struct HandlerDispatcher<H, E>
where
    E: Executor + Clone,
{
    handler: H,
    executor: E,
    work: Option<WorkGuard<E>>,
}

impl<H, E> HandlerDispatcher<H, E>
where
    E: Executor + Clone,
{
    /// Bind `handler` to `executor` for an operation owned by `home`
    pub fn new(handler: H, executor: E, home: &Scheduler) -> Self {
        let work = if executor.target() == Target::Scheduler(home.id()) {
            None
        } else {
            Some(WorkGuard::acquire(executor.clone()))
        };
        Self {
            handler,
            executor,
            work,
        }
    }

    #[inline]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// True if the dispatcher holds work on a foreign context
    #[inline]
    pub fn holds_work(&self) -> bool {
        self.work.is_some()
    }

    /// Deliver `args` to the handler via the executor's dispatch, then
    /// release any work held on the executor's context.
    pub fn invoke<A>(self, args: A)
    where
        H: FnOnce(A) + Send + 'static,
        A: Send + 'static,
    {
        self.invoke_with(move |handler| handler(args));
    }

    /// Like [`invoke`](Self::invoke), for handlers that take more than one
    /// argument: `call` receives the handler on the executor's thread.
    pub fn invoke_with<F>(self, call: F)
    where
        H: Send + 'static,
        F: FnOnce(H) + Send + 'static,
    {
        let Self {
            handler,
            executor,
            work,
        } = self;
        executor.dispatch(Box::new(move || call(handler)));
        drop(work);
    }
}

impl<H, E> std::fmt::Debug for HandlerDispatcher<H, E>
where
    E: Executor + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDispatcher")
            .field("target", &self.executor.target())
            .field("holds_work", &self.work.is_some())
            .finish()
    }
}
