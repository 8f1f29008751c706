//! Outstanding-work guard
//!
//! Holding a `WorkGuard` keeps the executor's context from running out of
//! work, so its `run` loops stay alive even with an empty queue. Releasing
//! consumes the guard; dropping an unreleased guard releases it.

use iosched_core::ContractViolation;

use crate::executor::Executor;

/// RAII claim of one unit of outstanding work on an executor's context
pub struct WorkGuard<E: Executor> {
    executor: E,
    owns: bool,
}

impl<E: Executor> WorkGuard<E> {
    /// Start one unit of work on `executor`
    pub fn acquire(executor: E) -> Self {
        executor.on_work_started();
        Self { executor, owns: true }
    }

    #[inline]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    #[inline]
    pub fn owns_work(&self) -> bool {
        self.owns
    }

    /// Finish the unit of work now
    pub fn release(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if !self.owns {
            ContractViolation::DoubleRelease.fatal();
        }
        self.owns = false;
        self.executor.on_work_finished();
    }
}

impl<E: Executor> Drop for WorkGuard<E> {
    fn drop(&mut self) {
        if self.owns {
            self.finish();
        }
    }
}

impl<E: Executor> std::fmt::Debug for WorkGuard<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkGuard")
            .field("target", &self.executor.target())
            .field("owns", &self.owns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;

    #[test]
    fn test_acquire_release() {
        let sched = Scheduler::new();
        let guard = WorkGuard::acquire(sched.executor());
        assert!(guard.owns_work());
        assert_eq!(sched.outstanding_work(), 1);

        guard.release();
        assert_eq!(sched.outstanding_work(), 0);
        assert!(sched.stopped());
    }

    #[test]
    fn test_drop_releases() {
        let sched = Scheduler::new();
        {
            let _g1 = sched.work_guard();
            let _g2 = sched.work_guard();
            assert_eq!(sched.outstanding_work(), 2);
        }
        assert_eq!(sched.outstanding_work(), 0);
    }

    #[test]
    fn test_guard_on_untracked_executor_is_noop() {
        use crate::executor::InlineExecutor;
        let guard = WorkGuard::acquire(InlineExecutor::new());
        assert!(guard.owns_work());
        guard.release();
    }
}
