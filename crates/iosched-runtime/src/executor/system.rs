//! Process-wide system executor

use iosched_core::{Blocking, Capability, CapabilityValue, OutstandingWork, Relationship};

use std::sync::OnceLock;
use std::thread;

use super::{Executor, Target, Work};
use crate::worker::ThreadPool;

static SYSTEM_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

fn system_pool() -> Option<&'static ThreadPool> {
    SYSTEM_POOL
        .get_or_init(|| {
            let threads = thread::available_parallelism().map(|n| n.get()).unwrap_or(2).max(2);
            match ThreadPool::with_name(threads, "iosched-system") {
                Ok(pool) => Some(pool),
                Err(e) => {
                    log::error!("system pool unavailable: {}", e);
                    None
                }
            }
        })
        .as_ref()
}

/// Executor backed by a lazily started, process-wide thread pool.
///
/// `Never` work is queued to the pool. `Possibly` and `Always` run on the
/// caller, since any thread may act as part of the system context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemExecutor {
    blocking: Blocking,
}

impl SystemExecutor {
    pub fn new() -> Self {
        Self {
            blocking: Blocking::Possibly,
        }
    }

    pub fn require_blocking(self, blocking: Blocking) -> Self {
        Self { blocking }
    }
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for SystemExecutor {
    fn execute(&self, work: Work, blocking: Blocking) {
        if blocking.allows_inline() {
            work();
            return;
        }
        match system_pool() {
            Some(pool) => pool.scheduler().post(work),
            None => {
                // No pool: one detached thread per item.
                thread::spawn(work);
            }
        }
    }

    fn blocking(&self) -> Blocking {
        self.blocking
    }

    fn query(&self, capability: Capability) -> Option<CapabilityValue> {
        match capability {
            Capability::Blocking => Some(CapabilityValue::Blocking(self.blocking)),
            Capability::OutstandingWork => Some(CapabilityValue::OutstandingWork(OutstandingWork::Untracked)),
            Capability::Relationship => Some(CapabilityValue::Relationship(Relationship::Fork)),
            Capability::Occupancy => system_pool().map(|p| CapabilityValue::Occupancy(p.num_threads())),
            Capability::ConcurrencyHint => system_pool().map(|p| CapabilityValue::ConcurrencyHint(p.num_threads())),
            Capability::Context => system_pool().map(|p| CapabilityValue::Context(p.scheduler().id())),
        }
    }

    fn target(&self) -> Target {
        Target::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_never_runs_on_pool_thread() {
        let ex = SystemExecutor::new().require_blocking(Blocking::Never);
        let (tx, rx) = mpsc::channel();
        super::super::dispatch(&ex, move || {
            let name = thread::current().name().map(str::to_string);
            tx.send((thread::current().id(), name)).unwrap();
        });
        let (id, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(id, thread::current().id());
        assert!(name.unwrap_or_default().starts_with("iosched-system"));
    }

    #[test]
    fn test_possibly_runs_inline() {
        let ex = SystemExecutor::new();
        let (tx, rx) = mpsc::channel();
        super::super::dispatch(&ex, move || tx.send(thread::current().id()).unwrap());
        assert_eq!(rx.try_recv().unwrap(), thread::current().id());
    }

    #[test]
    fn test_query_occupancy() {
        let ex = SystemExecutor::new();
        let occupancy = ex.query(Capability::Occupancy).and_then(|v| v.as_count());
        assert!(occupancy.unwrap_or(0) >= 2);
    }
}
