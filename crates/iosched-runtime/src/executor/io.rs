//! Executor bound to a scheduler

use iosched_core::{Blocking, Capability, CapabilityValue, OutstandingWork, Relationship};

use super::{Executor, Target, Work};
use crate::scheduler::Scheduler;

/// Submits work to a [`Scheduler`].
///
/// `Possibly` runs inline only when the calling thread is already inside
/// the scheduler's run loop. A tracked executor (see
/// [`track_work`](Self::track_work)) holds one unit of outstanding work per
/// live copy.
pub struct IoExecutor {
    scheduler: Scheduler,
    blocking: Blocking,
    tracked: bool,
}

impl IoExecutor {
    pub(crate) fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            blocking: Blocking::Possibly,
            tracked: false,
        }
    }

    fn derive(&self, blocking: Blocking, tracked: bool) -> Self {
        if tracked {
            self.scheduler.work_started();
        }
        Self {
            scheduler: self.scheduler.clone(),
            blocking,
            tracked,
        }
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Copy with a different default blocking category
    pub fn require_blocking(&self, blocking: Blocking) -> Self {
        self.derive(blocking, self.tracked)
    }

    /// Copy that keeps the scheduler's `run` alive while it exists
    pub fn track_work(&self) -> Self {
        self.derive(self.blocking, true)
    }

    /// Copy that does not affect outstanding work
    pub fn untrack_work(&self) -> Self {
        self.derive(self.blocking, false)
    }

    #[inline]
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }

    #[inline]
    pub fn running_in_this_thread(&self) -> bool {
        self.scheduler.running_in_this_thread()
    }
}

impl Clone for IoExecutor {
    fn clone(&self) -> Self {
        self.derive(self.blocking, self.tracked)
    }
}

impl Drop for IoExecutor {
    fn drop(&mut self) {
        if self.tracked {
            self.scheduler.work_finished();
        }
    }
}

impl PartialEq for IoExecutor {
    fn eq(&self, other: &Self) -> bool {
        self.scheduler == other.scheduler
    }
}

impl Eq for IoExecutor {}

impl std::fmt::Debug for IoExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoExecutor")
            .field("scheduler", &self.scheduler.id())
            .field("blocking", &self.blocking)
            .field("tracked", &self.tracked)
            .finish()
    }
}

impl Executor for IoExecutor {
    fn execute(&self, work: Work, blocking: Blocking) {
        match blocking {
            Blocking::Never => self.scheduler.post(work),
            Blocking::Possibly if self.scheduler.running_in_this_thread() => work(),
            Blocking::Possibly => self.scheduler.post(work),
            Blocking::Always => work(),
        }
    }

    fn blocking(&self) -> Blocking {
        self.blocking
    }

    fn query(&self, capability: Capability) -> Option<CapabilityValue> {
        let value = match capability {
            Capability::Blocking => CapabilityValue::Blocking(self.blocking),
            Capability::OutstandingWork => CapabilityValue::OutstandingWork(if self.tracked {
                OutstandingWork::Tracked
            } else {
                OutstandingWork::Untracked
            }),
            Capability::Occupancy => CapabilityValue::Occupancy(self.scheduler.config().concurrency_hint),
            Capability::ConcurrencyHint => {
                CapabilityValue::ConcurrencyHint(self.scheduler.config().concurrency_hint)
            }
            Capability::Relationship => CapabilityValue::Relationship(Relationship::Fork),
            Capability::Context => CapabilityValue::Context(self.scheduler.id()),
        };
        Some(value)
    }

    fn target(&self) -> Target {
        Target::Scheduler(self.scheduler.id())
    }

    fn on_work_started(&self) {
        self.scheduler.work_started();
    }

    fn on_work_finished(&self) {
        self.scheduler.work_finished();
    }
}
