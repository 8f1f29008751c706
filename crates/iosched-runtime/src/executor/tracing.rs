//! Executor adapter that logs around each unit of work

use iosched_core::{Blocking, Capability, CapabilityValue};

use super::{Executor, Target, Work};

/// Wraps another executor and logs entry to and exit from every unit of
/// work at `debug` level. Queries, equality and work tracking pass through.
#[derive(Debug, Clone)]
pub struct TracingExecutor<E> {
    inner: E,
    label: &'static str,
}

struct ExitLog(&'static str);

impl Drop for ExitLog {
    fn drop(&mut self) {
        log::debug!("[{}] exit", self.0);
    }
}

impl<E: Executor> TracingExecutor<E> {
    pub fn new(inner: E, label: &'static str) -> Self {
        Self { inner, label }
    }

    #[inline]
    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: Executor> Executor for TracingExecutor<E> {
    fn execute(&self, work: Work, blocking: Blocking) {
        let label = self.label;
        log::trace!("[{}] submit ({})", label, blocking);
        self.inner.execute(
            Box::new(move || {
                log::debug!("[{}] entry", label);
                let _exit = ExitLog(label);
                work();
            }),
            blocking,
        );
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InlineExecutor;
    use crate::scheduler::Scheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_forwards_work_and_queries() {
        let _ = env_logger::builder().is_test(true).try_init();
        let ex = TracingExecutor::new(InlineExecutor::new(), "inline");
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        crate::executor::dispatch(&ex, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(ex.query(Capability::Occupancy), Some(CapabilityValue::Occupancy(1)));
        assert!(ex.same_target(&InlineExecutor::new()));
    }

    #[test]
    fn test_forwards_work_tracking() {
        let sched = Scheduler::new();
        let ex = TracingExecutor::new(sched.executor(), "io");
        let guard = crate::work::WorkGuard::acquire(ex);
        assert_eq!(sched.outstanding_work(), 1);
        drop(guard);
        assert_eq!(sched.outstanding_work(), 0);
    }
}
