//! Ready queue of completed operations
//!
//! FIFO of operations waiting for their completion upcall, shared by every
//! thread running the owning scheduler. Idle threads park on a condvar
//! until an operation is pushed or the scheduler is stopped.

use iosched_core::IoResult;

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crate::operation::Operation;

/// Initial queue capacity
const INITIAL_CAPACITY: usize = 256;

/// A queued operation together with the arguments of its completion call
pub(crate) struct QueuedOp {
    pub op: Box<dyn Operation>,
    pub status: IoResult<()>,
    pub bytes: usize,
}

/// How long `pop` may wait for an operation
#[derive(Debug, Clone, Copy)]
pub(crate) enum Wait {
    /// Return immediately if nothing is queued
    Poll,
    /// Park until an operation arrives or the queue is stopped
    Block,
    /// Park until the deadline at most
    Until(Instant),
}

struct State {
    ops: VecDeque<QueuedOp>,
    stopped: bool,
}

pub(crate) struct ReadyQueue {
    state: Mutex<State>,
    cond: Condvar,
    len: AtomicUsize,
    parked: AtomicUsize,
}

impl ReadyQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                ops: VecDeque::with_capacity(INITIAL_CAPACITY),
                stopped: false,
            }),
            cond: Condvar::new(),
            len: AtomicUsize::new(0),
            parked: AtomicUsize::new(0),
        }
    }

    pub(crate) fn push(&self, entry: QueuedOp) {
        {
            let mut state = self.state.lock();
            state.ops.push_back(entry);
            self.len.store(state.ops.len(), Ordering::Release);
        }
        // Wake one parked runner
        if self.parked.load(Ordering::SeqCst) > 0 {
            self.cond.notify_one();
        }
    }

    /// Pop the oldest operation.
    ///
    /// Returns `None` once the queue is stopped, when polling an empty
    /// queue, or when the deadline passes.
    pub(crate) fn pop(&self, wait: Wait) -> Option<QueuedOp> {
        let mut state = self.state.lock();
        loop {
            if state.stopped {
                return None;
            }
            if let Some(entry) = state.ops.pop_front() {
                self.len.store(state.ops.len(), Ordering::Release);
                return Some(entry);
            }

            self.parked.fetch_add(1, Ordering::SeqCst);
            let timed_out = match wait {
                Wait::Poll => true,
                Wait::Block => {
                    self.cond.wait(&mut state);
                    false
                }
                Wait::Until(deadline) => self.cond.wait_until(&mut state, deadline).timed_out(),
            };
            self.parked.fetch_sub(1, Ordering::SeqCst);

            if timed_out {
                // One last look: a push may have raced the timeout.
                if state.stopped {
                    return None;
                }
                let entry = state.ops.pop_front();
                self.len.store(state.ops.len(), Ordering::Release);
                return entry;
            }
        }
    }

    /// Stop the queue and wake every parked runner
    pub(crate) fn stop(&self) {
        self.state.lock().stopped = true;
        self.cond.notify_all();
    }

    pub(crate) fn restart(&self) {
        self.state.lock().stopped = false;
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Take every queued operation, leaving the queue empty
    pub(crate) fn drain(&self) -> Vec<QueuedOp> {
        let mut state = self.state.lock();
        let drained: Vec<QueuedOp> = state.ops.drain(..).collect();
        self.len.store(0, Ordering::Release);
        drained
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Acquire)
    }
}
