//! Operation records
//!
//! An operation is a heap-allocated record that the scheduler queues and
//! later hands back through a single completion entry point:
//!
//! ```text
//! complete(self: Box<Self>, owner, status, bytes)
//!
//!   owner = Some(sched)  -> perform the upcall (or the blocking phase,
//!                           for two-phase operations on a private worker)
//!   owner = None         -> destroy only; the scheduler is shutting down
//! ```
//!
//! Taking `self: Box<Self>` makes the record single-use: once the entry
//! point runs, nothing else can reach it.
//!
//! # Lifecycle
//!
//! ```text
//! Created --> Blocking --> ReadyForCompletion --> Completed
//!    \_____________________^
//! ```
//!
//! Before the upcall the record moves its handler and result onto the
//! stack and frees itself, so a handler that submits new operations can
//! reuse the memory.

use iosched_core::{ContractViolation, IoResult};

use crate::dispatcher::HandlerDispatcher;
use crate::executor::Executor;
use crate::scheduler::Scheduler;

/// A queued unit of completion work
pub trait Operation: Send + 'static {
    /// Run (or destroy) the operation.
    ///
    /// Called exactly once per record, either by a thread running `owner`
    /// or with `owner = None` during shutdown.
    fn complete(self: Box<Self>, owner: Option<&Scheduler>, status: IoResult<()>, bytes: usize);
}

/// Lifecycle phase of an operation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpPhase {
    /// Allocated, not yet submitted
    Created,
    /// Claimed by a worker for its blocking phase
    Blocking,
    /// Result available, waiting for the home scheduler
    ReadyForCompletion,
    /// Handler invoked (or record destroyed)
    Completed,
}

impl OpPhase {
    pub fn name(self) -> &'static str {
        match self {
            OpPhase::Created => "created",
            OpPhase::Blocking => "blocking",
            OpPhase::ReadyForCompletion => "ready-for-completion",
            OpPhase::Completed => "completed",
        }
    }

    /// Move to `next`, halting on a transition the lifecycle forbids.
    #[track_caller]
    pub fn advance(&mut self, next: OpPhase) {
        use OpPhase::*;
        let legal = matches!(
            (*self, next),
            (Created, Blocking)
                | (Created, ReadyForCompletion)
                | (Blocking, ReadyForCompletion)
                | (ReadyForCompletion, Completed)
        );
        if !legal {
            if *self == Completed {
                ContractViolation::DoubleCompletion.fatal();
            }
            ContractViolation::IllegalTransition {
                from: self.name(),
                to: next.name(),
            }
            .fatal();
        }
        log::trace!("op {} -> {}", self.name(), next.name());
        *self = next;
    }
}

/// A posted closure
pub(crate) struct TaskOp<F> {
    func: F,
}

impl<F> TaskOp<F>
where
    F: FnOnce() + Send + 'static,
{
    pub(crate) fn new(func: F) -> Box<Self> {
        Box::new(Self { func })
    }
}

impl<F> Operation for TaskOp<F>
where
    F: FnOnce() + Send + 'static,
{
    fn complete(self: Box<Self>, owner: Option<&Scheduler>, _status: IoResult<()>, _bytes: usize) {
        let TaskOp { func } = *self;
        if owner.is_some() {
            func();
        }
    }
}

/// An operation whose result is known at submission.
///
/// There is no blocking phase: the record is queued on the home scheduler
/// ready for completion, and the handler receives `result` through its
/// dispatcher when a runner pops it.
pub struct CompletionOp<T, H, E>
where
    E: Executor + Clone,
{
    result: IoResult<T>,
    dispatcher: HandlerDispatcher<H, E>,
    phase: OpPhase,
}

impl<T, H, E> CompletionOp<T, H, E>
where
    T: Send + 'static,
    H: FnOnce(IoResult<T>) + Send + 'static,
    E: Executor + Clone,
{
    /// Queue `result` for delivery to `handler` via `executor`.
    ///
    /// Fails with `ResourceExhausted` when the scheduler's admission limit
    /// is reached; the handler is dropped without being called.
    pub fn submit(home: &Scheduler, executor: E, result: IoResult<T>, handler: H) -> IoResult<()> {
        home.try_work_started()?;
        let mut op = Box::new(Self {
            result,
            dispatcher: HandlerDispatcher::new(handler, executor, home),
            phase: OpPhase::Created,
        });
        op.phase.advance(OpPhase::ReadyForCompletion);
        home.post_deferred_completion(op);
        Ok(())
    }
}

impl<T, H, E> Operation for CompletionOp<T, H, E>
where
    T: Send + 'static,
    H: FnOnce(IoResult<T>) + Send + 'static,
    E: Executor + Clone,
{
    fn complete(self: Box<Self>, owner: Option<&Scheduler>, _status: IoResult<()>, _bytes: usize) {
        let mut this = *self;
        if owner.is_none() {
            log::debug!("completion op destroyed without upcall");
            return;
        }
        this.phase.advance(OpPhase::Completed);
        let CompletionOp { result, dispatcher, .. } = this;
        dispatcher.invoke(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iosched_core::IoError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};

    #[test]
    fn test_phase_happy_path() {
        let mut phase = OpPhase::Created;
        phase.advance(OpPhase::Blocking);
        phase.advance(OpPhase::ReadyForCompletion);
        phase.advance(OpPhase::Completed);
        assert_eq!(phase, OpPhase::Completed);
    }

    #[test]
    fn test_phase_skip_blocking() {
        let mut phase = OpPhase::Created;
        phase.advance(OpPhase::ReadyForCompletion);
        phase.advance(OpPhase::Completed);
        assert_eq!(phase, OpPhase::Completed);
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_phase_double_completion() {
        let mut phase = OpPhase::Completed;
        phase.advance(OpPhase::Completed);
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn test_phase_backwards() {
        let mut phase = OpPhase::ReadyForCompletion;
        phase.advance(OpPhase::Blocking);
    }

    #[test]
    fn test_completion_op_delivers_once() {
        let sched = Scheduler::new();
        let (tx, rx) = mpsc::channel();

        CompletionOp::submit(&sched, sched.executor(), Ok(42u32), move |r: IoResult<u32>| {
            tx.send(r).unwrap();
        })
        .unwrap();

        assert_eq!(sched.run(), 1);
        assert_eq!(rx.try_recv().unwrap(), Ok(42));
        assert!(rx.try_recv().is_err());
        assert_eq!(sched.outstanding_work(), 0);
    }

    #[test]
    fn test_completion_op_delivers_error() {
        let sched = Scheduler::new();
        let (tx, rx) = mpsc::channel();

        CompletionOp::submit(&sched, sched.executor(), Err::<(), _>(IoError::Canceled), move |r| {
            tx.send(r).unwrap();
        })
        .unwrap();

        sched.run();
        assert_eq!(rx.try_recv().unwrap(), Err(IoError::Canceled));
    }

    #[test]
    fn test_destroyed_op_drops_handler() {
        struct DropCount(Arc<AtomicUsize>);
        impl Drop for DropCount {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let sched = Scheduler::new();
        let guard = DropCount(Arc::clone(&drops));
        let calls2 = Arc::clone(&calls);

        CompletionOp::submit(&sched, sched.executor(), Ok(()), move |_| {
            let _g = &guard;
            calls2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        sched.shutdown();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
