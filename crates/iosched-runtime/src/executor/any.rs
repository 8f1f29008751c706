//! Type-erased executor

use iosched_core::{Blocking, Capability, CapabilityValue};

use std::sync::Arc;

use super::{Executor, Target, Work};

/// Shareable executor of any concrete type.
///
/// Clones share the wrapped executor, so a tracked executor inside an
/// `AnyExecutor` holds its unit of work until the last clone drops.
#[derive(Clone)]
pub struct AnyExecutor {
    inner: Arc<dyn Executor>,
}

impl AnyExecutor {
    pub fn new<E: Executor>(executor: E) -> Self {
        Self {
            inner: Arc::new(executor),
        }
    }
}

impl Executor for AnyExecutor {
    fn execute(&self, work: Work, blocking: Blocking) {
        self.inner.execute(work, blocking);
    }

    fn blocking(&self) -> Blocking {
        self.inner.blocking()
    }

    fn query(&self, capability: Capability) -> Option<CapabilityValue> {
        self.inner.query(capability)
    }

    fn target(&self) -> Target {
        self.inner.target()
    }

    fn on_work_started(&self) {
        self.inner.on_work_started();
    }

    fn on_work_finished(&self) {
        self.inner.on_work_finished();
    }
}

impl PartialEq for AnyExecutor {
    fn eq(&self, other: &Self) -> bool {
        self.target() == other.target()
    }
}

impl Eq for AnyExecutor {}

impl std::fmt::Debug for AnyExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyExecutor")
            .field("target", &self.target())
            .field("blocking", &self.blocking())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{InlineExecutor, SystemExecutor};
    use crate::scheduler::Scheduler;

    #[test]
    fn test_erased_equality() {
        let sched = Scheduler::new();
        let a = AnyExecutor::new(sched.executor());
        let b = AnyExecutor::new(sched.executor().require_blocking(Blocking::Never));
        assert_eq!(a, b);
        assert_ne!(a, AnyExecutor::new(InlineExecutor::new()));
        assert_ne!(AnyExecutor::new(SystemExecutor::new()), AnyExecutor::new(InlineExecutor::new()));
    }

    #[test]
    fn test_erased_tracked_executor() {
        let sched = Scheduler::new();
        let any = AnyExecutor::new(sched.executor().track_work());
        let copy = any.clone();
        assert_eq!(sched.outstanding_work(), 1);
        drop(any);
        assert_eq!(sched.outstanding_work(), 1);
        drop(copy);
        assert_eq!(sched.outstanding_work(), 0);
    }

    #[test]
    fn test_erased_blocking_passes_through() {
        let sched = Scheduler::new();
        let any = AnyExecutor::new(sched.executor().require_blocking(Blocking::Never));
        assert_eq!(any.blocking(), Blocking::Never);
        assert_eq!(
            any.query(Capability::Blocking),
            Some(CapabilityValue::Blocking(Blocking::Never))
        );
    }
}
