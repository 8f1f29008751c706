//! Runtime capability queries
//!
//! Executors answer `query(Capability)` with `Some(CapabilityValue)` when
//! they support the property and `None` when they do not. Callers adapt to
//! the answer instead of negotiating properties at compile time.

use crate::blocking::Blocking;
use crate::id::ContextId;

/// Whether an executor counts as outstanding work on its context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutstandingWork {
    /// The executor keeps its context's run loop alive while it exists
    Tracked,
    /// The executor does not affect the run loop
    Untracked,
}

/// Relationship of submitted work to the submitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relationship {
    /// Work is independent of the caller
    Fork,
    /// Work continues the caller's logical flow
    Continuation,
}

/// A queryable executor property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Default blocking category
    Blocking,
    /// Outstanding work tracking
    OutstandingWork,
    /// Number of execution agents the executor can run at once
    Occupancy,
    /// Expected number of threads driving the underlying context
    ConcurrencyHint,
    /// Fork or continuation
    Relationship,
    /// Identity of the underlying execution context
    Context,
}

/// Answer to a capability query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityValue {
    Blocking(Blocking),
    OutstandingWork(OutstandingWork),
    Occupancy(usize),
    ConcurrencyHint(usize),
    Relationship(Relationship),
    Context(ContextId),
}

impl CapabilityValue {
    /// The capability this value answers
    pub fn capability(&self) -> Capability {
        match self {
            CapabilityValue::Blocking(_) => Capability::Blocking,
            CapabilityValue::OutstandingWork(_) => Capability::OutstandingWork,
            CapabilityValue::Occupancy(_) => Capability::Occupancy,
            CapabilityValue::ConcurrencyHint(_) => Capability::ConcurrencyHint,
            CapabilityValue::Relationship(_) => Capability::Relationship,
            CapabilityValue::Context(_) => Capability::Context,
        }
    }

    /// Extract a blocking category
    pub fn as_blocking(&self) -> Option<Blocking> {
        match *self {
            CapabilityValue::Blocking(b) => Some(b),
            _ => None,
        }
    }

    /// Extract a count (occupancy or concurrency hint)
    pub fn as_count(&self) -> Option<usize> {
        match *self {
            CapabilityValue::Occupancy(n) | CapabilityValue::ConcurrencyHint(n) => Some(n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CapabilityValue::Blocking(Blocking::Never), Capability::Blocking)]
    #[case(CapabilityValue::OutstandingWork(OutstandingWork::Tracked), Capability::OutstandingWork)]
    #[case(CapabilityValue::Occupancy(4), Capability::Occupancy)]
    #[case(CapabilityValue::ConcurrencyHint(2), Capability::ConcurrencyHint)]
    #[case(CapabilityValue::Relationship(Relationship::Fork), Capability::Relationship)]
    #[case(CapabilityValue::Context(ContextId::next()), Capability::Context)]
    fn test_value_answers_capability(#[case] value: CapabilityValue, #[case] cap: Capability) {
        assert_eq!(value.capability(), cap);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(CapabilityValue::Blocking(Blocking::Always).as_blocking(), Some(Blocking::Always));
        assert_eq!(CapabilityValue::Occupancy(3).as_count(), Some(3));
        assert_eq!(CapabilityValue::Occupancy(3).as_blocking(), None);
        assert_eq!(
            CapabilityValue::Relationship(Relationship::Continuation).as_count(),
            None
        );
    }
}
