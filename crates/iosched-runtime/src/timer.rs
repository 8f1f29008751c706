//! Deadline timer: cancel a token when a deadline passes
//!
//! Timeouts are expressed as cancellation. `arm(token, after)` registers a
//! deadline; if it is still armed when the deadline passes, a dedicated
//! timer thread calls `token.cancel()`, and the operation observing the
//! token finishes with `IoError::Canceled`.
//!
//! ```text
//!  arm() ──push──> inbox (SegQueue) ──drain──> min-heap ──expired──> token.cancel()
//!                                                   ^
//!  disarm() ─────> armed set (remove) ─────────────-┘ skipped when popped
//! ```
//!
//! Disarmed entries stay in the heap and are dropped when they reach the
//! top (lazy cancellation).

use iosched_core::CancelToken;

use crossbeam_queue::SegQueue;
use parking_lot::Mutex;

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::SchedulerConfig;

/// Handle for disarming an armed deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    #[inline]
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        TimerHandle(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct Deadline {
    handle: TimerHandle,
    at: Instant,
    token: CancelToken,
}

impl PartialEq for Deadline {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.handle == other.handle
    }
}

impl Eq for Deadline {}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed: BinaryHeap is a max-heap, earliest deadline must be on top
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.handle.0.cmp(&self.handle.0))
    }
}

/// Counters reported when the timer thread exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    pub armed: u64,
    pub fired: u64,
    pub disarmed: u64,
}

struct Shared {
    inbox: SegQueue<Deadline>,
    armed: Mutex<HashSet<TimerHandle>>,
    shutdown: AtomicBool,
    disarmed: AtomicU64,
}

/// Owns the timer thread; dropping it stops and joins the thread.
pub struct DeadlineTimer {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<TimerStats>>,
}

impl DeadlineTimer {
    /// Start a timer thread using the environment configuration
    pub fn new() -> io::Result<Self> {
        Self::start(SchedulerConfig::from_env().timer_max_sleep)
    }

    /// Start a timer thread that sleeps at most `max_sleep` between checks
    pub fn start(max_sleep: Duration) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            inbox: SegQueue::new(),
            armed: Mutex::new(HashSet::new()),
            shutdown: AtomicBool::new(false),
            disarmed: AtomicU64::new(0),
        });
        let loop_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("iosched-timer".to_string())
            .spawn(move || timer_loop(&loop_shared, max_sleep))?;

        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Cancel `token` once `after` has elapsed, unless disarmed first
    pub fn arm(&self, token: CancelToken, after: Duration) -> TimerHandle {
        let handle = TimerHandle::next();
        self.shared.armed.lock().insert(handle);
        // Past the representable range: stays armed, never fires.
        let Some(at) = Instant::now().checked_add(after) else {
            log::trace!("deadline {} beyond the clock range", handle.0);
            return handle;
        };
        self.shared.inbox.push(Deadline { handle, at, token });
        if let Some(t) = &self.thread {
            t.thread().unpark();
        }
        handle
    }

    /// Disarm a deadline. Returns `false` if it already fired or was
    /// disarmed before.
    pub fn disarm(&self, handle: TimerHandle) -> bool {
        let removed = self.shared.armed.lock().remove(&handle);
        if removed {
            self.shared.disarmed.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Number of deadlines armed and not yet fired or disarmed
    pub fn pending(&self) -> usize {
        self.shared.armed.lock().len()
    }

    /// Stop the timer thread. Armed deadlines never fire.
    pub fn shutdown(mut self) -> TimerStats {
        self.stop_thread()
    }

    fn stop_thread(&mut self) -> TimerStats {
        self.shared.shutdown.store(true, Ordering::Release);
        let Some(handle) = self.thread.take() else {
            return TimerStats::default();
        };
        handle.thread().unpark();
        match handle.join() {
            Ok(stats) => stats,
            Err(_) => {
                log::warn!("timer thread panicked");
                TimerStats::default()
            }
        }
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

fn timer_loop(shared: &Shared, max_sleep: Duration) -> TimerStats {
    let mut heap: BinaryHeap<Deadline> = BinaryHeap::new();
    let mut stats = TimerStats::default();
    log::debug!("timer thread started (max_sleep={:?})", max_sleep);

    while !shared.shutdown.load(Ordering::Acquire) {
        while let Some(deadline) = shared.inbox.pop() {
            stats.armed += 1;
            heap.push(deadline);
        }

        let now = Instant::now();
        while heap.peek().map_or(false, |d| d.at <= now) {
            let Some(deadline) = heap.pop() else { break };
            if shared.armed.lock().remove(&deadline.handle) {
                log::trace!("deadline {} expired", deadline.handle.0);
                deadline.token.cancel();
                stats.fired += 1;
            }
        }

        let sleep = heap
            .peek()
            .map(|d| d.at.saturating_duration_since(now))
            .unwrap_or(max_sleep)
            .min(max_sleep);
        thread::park_timeout(sleep);
    }

    stats.disarmed = shared.disarmed.load(Ordering::Relaxed);
    log::debug!(
        "timer thread exiting (armed={}, fired={}, disarmed={})",
        stats.armed,
        stats.fired,
        stats.disarmed
    );
    stats
}
