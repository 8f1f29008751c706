//! Executors: where and how submitted work runs
//!
//! An executor accepts a unit of work together with a blocking category:
//!
//! | Category   | Behavior                                                  |
//! |------------|-----------------------------------------------------------|
//! | `Never`    | Queued; never run by the submitting thread                |
//! | `Possibly` | Run inline when the executor says that is safe, else queued |
//! | `Always`   | Run inline; the submitter blocks until it is done         |
//!
//! Properties beyond submission are discovered at runtime with
//! [`Executor::query`], which answers `None` for unsupported capabilities.
//!
//! # Implementations
//!
//! - [`IoExecutor`]: submits to a [`Scheduler`](crate::Scheduler)
//! - [`SystemExecutor`]: process-wide thread pool
//! - [`InlineExecutor`]: runs work on the caller, occupancy 1
//! - [`TracingExecutor`]: logs entry and exit around another executor
//! - [`AnyExecutor`]: type-erased, shareable executor

mod any;
mod inline;
mod io;
mod system;
mod tracing;

pub use any::AnyExecutor;
pub use inline::InlineExecutor;
pub use io::IoExecutor;
pub use system::SystemExecutor;
pub use tracing::TracingExecutor;

use iosched_core::{Blocking, Capability, CapabilityValue, ContextId};

/// A type-erased unit of work
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// The execution resource an executor submits to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// A specific scheduler
    Scheduler(ContextId),
    /// The process-wide system pool
    System,
    /// The submitting thread
    Inline,
}

/// Submission interface shared by every executor.
///
/// Two executors are equal when they submit to the same [`Target`];
/// blocking category and work tracking do not take part.
pub trait Executor: Send + Sync + 'static {
    /// Submit `work` under the given blocking category
    fn execute(&self, work: Work, blocking: Blocking);

    /// This executor's default blocking category
    fn blocking(&self) -> Blocking {
        Blocking::Possibly
    }

    /// Answer a capability query; `None` if unsupported
    fn query(&self, capability: Capability) -> Option<CapabilityValue>;

    fn target(&self) -> Target;

    /// Start one unit of outstanding work on the underlying context
    fn on_work_started(&self) {}

    /// Finish one unit of outstanding work on the underlying context
    fn on_work_finished(&self) {}

    /// Submit under the executor's own blocking category
    fn dispatch(&self, work: Work) {
        self.execute(work, self.blocking());
    }

    /// Submit as `Never`
    fn post(&self, work: Work) {
        self.execute(work, Blocking::Never);
    }

    fn same_target(&self, other: &dyn Executor) -> bool {
        self.target() == other.target()
    }
}

/// Queue `f` on `executor`; it never runs inside this call
pub fn post<E, F>(executor: &E, f: F)
where
    E: Executor + ?Sized,
    F: FnOnce() + Send + 'static,
{
    executor.post(Box::new(f));
}

/// Submit `f` under `executor`'s blocking category
pub fn dispatch<E, F>(executor: &E, f: F)
where
    E: Executor + ?Sized,
    F: FnOnce() + Send + 'static,
{
    executor.dispatch(Box::new(f));
}

/// Queue `f` as a continuation of the current handler.
///
/// Same delivery as [`post`]; the hint only tells the executor the work
/// continues the caller's flow.
pub fn defer<E, F>(executor: &E, f: F)
where
    E: Executor + ?Sized,
    F: FnOnce() + Send + 'static,
{
    log::trace!("defer to {:?}", executor.target());
    executor.post(Box::new(f));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use iosched_core::{OutstandingWork, Relationship};
    use rstest::rstest;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    #[rstest]
    #[case(Blocking::Never, false)]
    #[case(Blocking::Possibly, true)]
    #[case(Blocking::Always, true)]
    fn test_dispatch_inside_run(#[case] blocking: Blocking, #[case] expect_inline: bool) {
        let sched = Scheduler::new();
        let ex = sched.executor().require_blocking(blocking);
        let (tx, rx) = mpsc::channel();

        sched.post(move || {
            let ran = Arc::new(AtomicBool::new(false));
            let ran2 = Arc::clone(&ran);
            dispatch(&ex, move || ran2.store(true, Ordering::SeqCst));
            tx.send(ran.load(Ordering::SeqCst)).unwrap();
        });
        sched.run();

        assert_eq!(rx.recv().unwrap(), expect_inline);
    }

    #[test]
    fn test_never_runs_on_worker_thread() {
        let sched = Scheduler::new();
        let guard = sched.work_guard();
        let runner = sched.clone();
        let worker = thread::spawn(move || {
            runner.run();
            thread::current().id()
        });

        let (tx, rx) = mpsc::channel();
        let ex = sched.executor().require_blocking(Blocking::Never);
        dispatch(&ex, move || tx.send(thread::current().id()).unwrap());

        let ran_on = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        guard.release();
        let worker_id = worker.join().unwrap();

        assert_ne!(ran_on, thread::current().id());
        assert_eq!(ran_on, worker_id);
    }

    #[test]
    fn test_always_runs_on_caller() {
        let sched = Scheduler::new();
        let ex = sched.executor().require_blocking(Blocking::Always);
        let (tx, rx) = mpsc::channel();
        dispatch(&ex, move || tx.send(thread::current().id()).unwrap());
        assert_eq!(rx.try_recv().unwrap(), thread::current().id());
        assert_eq!(sched.outstanding_work(), 0);
    }

    #[test]
    fn test_defer_queues() {
        let sched = Scheduler::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = Arc::clone(&ran);
        defer(&sched.executor(), move || ran2.store(true, Ordering::SeqCst));
        assert!(!ran.load(Ordering::SeqCst));
        sched.run();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_query_answers() {
        let sched = Scheduler::new();
        let ex = sched.executor();
        assert_eq!(
            ex.query(Capability::Blocking),
            Some(CapabilityValue::Blocking(Blocking::Possibly))
        );
        assert_eq!(
            ex.query(Capability::OutstandingWork),
            Some(CapabilityValue::OutstandingWork(OutstandingWork::Untracked))
        );
        assert_eq!(
            ex.query(Capability::Relationship),
            Some(CapabilityValue::Relationship(Relationship::Fork))
        );
        assert_eq!(ex.query(Capability::Context), Some(CapabilityValue::Context(sched.id())));

        let inline = InlineExecutor::new();
        assert_eq!(inline.query(Capability::Occupancy), Some(CapabilityValue::Occupancy(1)));
        assert_eq!(inline.query(Capability::Context), None);
    }

    #[test]
    fn test_equality_by_target() {
        let a = Scheduler::new();
        let b = Scheduler::new();
        let never = a.executor().require_blocking(Blocking::Never);
        let always = a.executor().require_blocking(Blocking::Always);
        assert!(never.same_target(&always));
        assert!(!never.same_target(&b.executor()));
        assert!(!InlineExecutor::new().same_target(&SystemExecutor::new()));
    }
}
