//! The scheduler: a run loop over a queue of completed operations
//!
//! Any number of threads may call `run` on the same scheduler; each pops
//! operations and invokes their completion entry point with itself as the
//! owner. The scheduler keeps a count of outstanding work. Posting work
//! increments it, finishing the upcall decrements it, and when it falls to
//! zero the scheduler stops and every `run` returns.
//!
//! ```text
//!   post / post_immediate_completion      work_started(); push
//!   post_deferred_completion              push (work already counted)
//!   run_one                               pop; complete(Some(self)); work_finished()
//!   work_finished() reaching 0            stop()
//! ```
//!
//! `Scheduler` is a cheap handle; clones share the same queue.

use iosched_core::{ContextId, ContractViolation, IoError, IoResult};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{ConfigError, SchedulerConfig};
use crate::executor::IoExecutor;
use crate::operation::{Operation, TaskOp};
use crate::ready_queue::{QueuedOp, ReadyQueue, Wait};
use crate::tls::{self, CallStackGuard};
use crate::work::WorkGuard;

struct Shared {
    id: ContextId,
    config: SchedulerConfig,
    queue: ReadyQueue,
    outstanding_work: AtomicUsize,
    running_threads: AtomicUsize,
}

/// Handle to a scheduler
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

/// Decrements outstanding work when an executed operation returns
struct WorkCleanup<'a>(&'a Scheduler);

impl Drop for WorkCleanup<'_> {
    fn drop(&mut self) {
        self.0.work_finished();
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl<'a> RunningGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Scheduler {
    /// Create a scheduler configured from the environment
    pub fn new() -> Self {
        Self::from_config(SchedulerConfig::from_env())
    }

    /// Create a scheduler with an explicit configuration
    pub fn with_config(config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    pub(crate) fn from_config(config: SchedulerConfig) -> Self {
        let id = ContextId::next();
        log::debug!(
            "scheduler {} created (concurrency_hint={}, max_outstanding={})",
            id,
            config.concurrency_hint,
            config.max_outstanding
        );
        Self {
            shared: Arc::new(Shared {
                id,
                config,
                queue: ReadyQueue::new(),
                outstanding_work: AtomicUsize::new(0),
                running_threads: AtomicUsize::new(0),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> ContextId {
        self.shared.id
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Executor submitting to this scheduler (blocking: possibly, untracked)
    pub fn executor(&self) -> IoExecutor {
        IoExecutor::new(self.clone())
    }

    /// Guard that keeps `run` from returning while it is held
    pub fn work_guard(&self) -> WorkGuard<IoExecutor> {
        WorkGuard::acquire(self.executor())
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Queue a closure. It never runs inside this call.
    pub fn post<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_immediate_completion(TaskOp::new(f));
    }

    /// Run a closure now if this thread is running the scheduler,
    /// otherwise queue it.
    pub fn dispatch<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.running_in_this_thread() {
            f();
        } else {
            self.post(f);
        }
    }

    /// Queue an operation, counting it as new outstanding work
    pub fn post_immediate_completion(&self, op: Box<dyn Operation>) {
        self.work_started();
        self.enqueue(op, Ok(()), 0);
    }

    /// Queue an operation whose work was counted when it was started
    pub fn post_deferred_completion(&self, op: Box<dyn Operation>) {
        self.enqueue(op, Ok(()), 0);
    }

    /// Like `post_deferred_completion`, carrying a status and byte count
    /// for the completion call
    pub fn post_deferred_completion_with(&self, op: Box<dyn Operation>, status: IoResult<()>, bytes: usize) {
        self.enqueue(op, status, bytes);
    }

    fn enqueue(&self, op: Box<dyn Operation>, status: IoResult<()>, bytes: usize) {
        self.shared.queue.push(QueuedOp { op, status, bytes });
    }

    // ========================================================================
    // Outstanding work
    // ========================================================================

    #[inline]
    pub fn work_started(&self) {
        self.shared.outstanding_work.fetch_add(1, Ordering::AcqRel);
    }

    /// Count new work unless the admission limit is reached
    pub fn try_work_started(&self) -> IoResult<()> {
        let limit = self.shared.config.max_outstanding;
        let counter = &self.shared.outstanding_work;
        let mut current = counter.load(Ordering::Acquire);
        loop {
            if current >= limit {
                log::warn!("scheduler {}: admission limit {} reached", self.id(), limit);
                return Err(IoError::ResourceExhausted("outstanding operation limit"));
            }
            match counter.compare_exchange_weak(current, current + 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Finish one unit of work; stops the scheduler when none remains
    pub fn work_finished(&self) {
        let prev = self
            .shared
            .outstanding_work
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match prev {
            Ok(1) => self.stop(),
            Ok(_) => {}
            Err(_) => ContractViolation::WorkUnderflow.fatal(),
        }
    }

    #[inline]
    pub fn outstanding_work(&self) -> usize {
        self.shared.outstanding_work.load(Ordering::Acquire)
    }

    /// Number of operations waiting in the ready queue
    #[inline]
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    // ========================================================================
    // Run loop
    // ========================================================================

    /// Run until stopped or out of work. Returns the number of handlers run.
    pub fn run(&self) -> usize {
        self.run_loop(Wait::Block, usize::MAX)
    }

    /// Run at most one handler, blocking until one is ready
    pub fn run_one(&self) -> usize {
        self.run_loop(Wait::Block, 1)
    }

    /// Run ready handlers without blocking
    pub fn poll(&self) -> usize {
        self.run_loop(Wait::Poll, usize::MAX)
    }

    /// Run at most one ready handler without blocking
    pub fn poll_one(&self) -> usize {
        self.run_loop(Wait::Poll, 1)
    }

    /// Like `run`, returning once `timeout` has elapsed
    pub fn run_for(&self, timeout: Duration) -> usize {
        self.run_loop(Self::wait_for(timeout), usize::MAX)
    }

    /// Like `run_one`, returning once `timeout` has elapsed
    pub fn run_one_for(&self, timeout: Duration) -> usize {
        self.run_loop(Self::wait_for(timeout), 1)
    }

    /// Timeouts past the clock's range wait without a deadline
    fn wait_for(timeout: Duration) -> Wait {
        Instant::now().checked_add(timeout).map_or(Wait::Block, Wait::Until)
    }

    fn run_loop(&self, wait: Wait, limit: usize) -> usize {
        if self.outstanding_work() == 0 {
            self.stop();
            return 0;
        }

        let _call_stack = CallStackGuard::enter(self.id());
        let _running = RunningGuard::new(&self.shared.running_threads);

        let mut n = 0;
        while n < limit && self.do_run_one(wait) {
            n += 1;
        }
        n
    }

    fn do_run_one(&self, wait: Wait) -> bool {
        let entry = match self.shared.queue.pop(wait) {
            Some(entry) => entry,
            None => return false,
        };

        let _cleanup = WorkCleanup(self);
        entry.op.complete(Some(self), entry.status, entry.bytes);
        true
    }

    /// Stop every `run` on this scheduler as soon as its current handler returns
    pub fn stop(&self) {
        log::trace!("scheduler {} stopping", self.id());
        self.shared.queue.stop();
    }

    /// Allow `run` again after a stop
    pub fn restart(&self) {
        self.shared.queue.restart();
    }

    #[inline]
    pub fn stopped(&self) -> bool {
        self.shared.queue.is_stopped()
    }

    /// True if the calling thread is inside this scheduler's run loop
    #[inline]
    pub fn running_in_this_thread(&self) -> bool {
        tls::is_running(self.id())
    }

    /// Threads currently inside `run`, `poll` or their variants
    #[inline]
    pub fn running_threads(&self) -> usize {
        self.shared.running_threads.load(Ordering::Acquire)
    }

    /// Threads blocked in `run` waiting for an operation to become ready
    #[inline]
    pub fn idle_threads(&self) -> usize {
        self.shared.queue.parked_count()
    }

    /// Stop and destroy every queued operation without its upcall.
    ///
    /// Destroying an operation may queue more; those are destroyed too.
    /// The scheduler must not be run again afterwards.
    pub fn shutdown(&self) {
        self.stop();
        let mut destroyed = 0usize;
        loop {
            let batch = self.shared.queue.drain();
            if batch.is_empty() {
                break;
            }
            for entry in batch {
                entry.op.complete(None, Err(IoError::Canceled), 0);
                destroyed += 1;
            }
        }
        if destroyed > 0 {
            log::warn!("scheduler {} shut down with {} pending operations", self.id(), destroyed);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Scheduler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Scheduler {}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("id", &self.id())
            .field("outstanding_work", &self.outstanding_work())
            .field("queued", &self.queued())
            .field("idle_threads", &self.idle_threads())
            .field("stopped", &self.stopped())
            .finish()
    }
}
