//! Caller-thread executor

use iosched_core::{Blocking, Capability, CapabilityValue, OutstandingWork, Relationship};

use super::{Executor, SystemExecutor, Target, Work};

/// Runs work on the submitting thread.
///
/// Occupancy is 1. `Never` work cannot run on the caller, so it is handed
/// to the [`SystemExecutor`] pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InlineExecutor;

impl InlineExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for InlineExecutor {
    fn execute(&self, work: Work, blocking: Blocking) {
        match blocking {
            Blocking::Never => SystemExecutor::new().post(work),
            Blocking::Possibly | Blocking::Always => work(),
        }
    }

    fn blocking(&self) -> Blocking {
        Blocking::Always
    }

    fn query(&self, capability: Capability) -> Option<CapabilityValue> {
        match capability {
            Capability::Blocking => Some(CapabilityValue::Blocking(Blocking::Always)),
            Capability::Occupancy => Some(CapabilityValue::Occupancy(1)),
            Capability::OutstandingWork => Some(CapabilityValue::OutstandingWork(OutstandingWork::Untracked)),
            Capability::Relationship => Some(CapabilityValue::Relationship(Relationship::Continuation)),
            Capability::ConcurrencyHint | Capability::Context => None,
        }
    }

    fn target(&self) -> Target {
        Target::Inline
    }
}
