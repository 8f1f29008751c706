//! Thread-local scheduler call stack
//!
//! Records which schedulers the current OS thread is running. A thread can
//! be inside several run loops at once (a handler that calls `run_one` on
//! another scheduler), so this is a stack, not a single slot.

use iosched_core::ContextId;
use std::cell::RefCell;

thread_local! {
    /// Schedulers whose run loop is active on this thread, innermost last
    static CALL_STACK: RefCell<Vec<ContextId>> = const { RefCell::new(Vec::new()) };
}

/// Marks the current thread as running a scheduler until dropped
pub(crate) struct CallStackGuard {
    id: ContextId,
}

impl CallStackGuard {
    pub(crate) fn enter(id: ContextId) -> Self {
        CALL_STACK.with(|stack| stack.borrow_mut().push(id));
        Self { id }
    }
}

impl Drop for CallStackGuard {
    fn drop(&mut self) {
        CALL_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|id| *id == self.id) {
                stack.remove(pos);
            }
        });
    }
}

/// Check if this thread is inside the run loop of `id`
#[inline]
pub fn is_running(id: ContextId) -> bool {
    CALL_STACK.with(|stack| stack.borrow().contains(&id))
}

/// Innermost scheduler this thread is running, if any
#[inline]
pub fn current() -> Option<ContextId> {
    CALL_STACK.with(|stack| stack.borrow().last().copied())
}
