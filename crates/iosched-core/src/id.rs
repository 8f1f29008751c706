//! Execution context identifier

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of an execution context (a scheduler or a scheduler-like resource).
///
/// Every scheduler draws a fresh id at construction. Executors compare
/// equal when they refer to the same id, and operations compare the
/// owner id passed to their completion entry point against their home
/// scheduler's id to tell their phases apart.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocate a new, process-unique id
    #[inline]
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ContextId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value (for logging)
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = ContextId::next();
        let b = ContextId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[test]
    fn test_display() {
        let id = ContextId::next();
        assert_eq!(format!("{}", id), format!("ctx#{}", id.as_u64()));
    }
}
