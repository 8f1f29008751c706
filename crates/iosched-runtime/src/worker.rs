//! Worker threads and thread pools
//!
//! A `WorkerPool` is a set of named OS threads that each call
//! [`Scheduler::run`] until it returns. A `ThreadPool` pairs a private
//! scheduler with a worker pool and a work guard, so its threads stay up
//! until the pool is joined or dropped.

use std::io;
use std::thread::{self, JoinHandle};

use crate::config::SchedulerConfig;
use crate::executor::IoExecutor;
use crate::scheduler::Scheduler;
use crate::work::WorkGuard;

/// Threads running a scheduler
pub struct WorkerPool {
    handles: Vec<JoinHandle<usize>>,
}

impl WorkerPool {
    /// Spawn `num_threads` threads named `{name}-{i}` that run `scheduler`
    pub fn start(scheduler: &Scheduler, num_threads: usize, name: &str) -> io::Result<Self> {
        let mut pool = Self {
            handles: Vec::with_capacity(num_threads),
        };

        for i in 0..num_threads {
            let sched = scheduler.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", name, i))
                .spawn(move || {
                    log::debug!("worker {} running scheduler {}", i, sched.id());
                    let n = sched.run();
                    log::debug!("worker {} exited after {} handlers", i, n);
                    n
                });
            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    log::error!("failed to spawn worker {}-{}: {}", name, i, e);
                    // Already-started workers would block forever on a held guard.
                    scheduler.stop();
                    pool.join();
                    return Err(e);
                }
            }
        }

        Ok(pool)
    }

    #[inline]
    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to return from `run`.
    ///
    /// Returns the total number of handlers run. A worker that panicked is
    /// logged and counted as zero.
    pub fn join(&mut self) -> usize {
        let mut total = 0;
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            match handle.join() {
                Ok(n) => total += n,
                Err(_) => log::warn!("{} panicked", name),
            }
        }
        total
    }
}

/// A private scheduler with its own worker threads
pub struct ThreadPool {
    scheduler: Scheduler,
    work: Option<WorkGuard<IoExecutor>>,
    workers: WorkerPool,
}

impl ThreadPool {
    /// Start a pool with `num_threads` workers, named from the environment
    /// configuration
    pub fn new(num_threads: usize) -> io::Result<Self> {
        let name = SchedulerConfig::from_env().thread_name;
        Self::with_name(num_threads, &name)
    }

    pub fn with_name(num_threads: usize, name: &str) -> io::Result<Self> {
        let num_threads = num_threads.max(1);
        let config = SchedulerConfig::from_env().concurrency_hint(num_threads);
        let scheduler = Scheduler::with_config(config)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let work = scheduler.work_guard();
        let workers = WorkerPool::start(&scheduler, num_threads, name)?;
        log::debug!("thread pool {} started with {} threads", scheduler.id(), num_threads);

        Ok(Self {
            scheduler,
            work: Some(work),
            workers,
        })
    }

    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn executor(&self) -> IoExecutor {
        self.scheduler.executor()
    }

    #[inline]
    pub fn num_threads(&self) -> usize {
        self.workers.num_threads()
    }

    /// Stop the workers as soon as their current handlers return
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Let the workers finish the queued work, then wait for them.
    ///
    /// Returns the number of handlers run.
    pub fn join(mut self) -> usize {
        self.finish()
    }

    fn finish(&mut self) -> usize {
        drop(self.work.take());
        let n = self.workers.join();
        self.scheduler.shutdown();
        n
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();
        self.finish();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("scheduler", &self.scheduler)
            .field("threads", &self.workers.num_threads())
            .finish()
    }
}
