//! # iosched-runtime
//!
//! Scheduler and execution machinery for the iosched engine.
//!
//! This crate provides:
//! - The scheduler run loop and its outstanding-work accounting
//! - Operation records and their completion lifecycle
//! - Executors with blocking categories and capability queries
//! - Work guards and handler dispatch through a bound executor
//! - Worker threads, thread pools and the blocking offload service
//! - A deadline timer that turns timeouts into cancellation

pub mod config;
pub mod tls;
mod ready_queue;
pub mod operation;
pub mod scheduler;
pub mod work;
pub mod executor;
pub mod dispatcher;
pub mod worker;
pub mod offload;
pub mod timer;

// Re-exports
pub use config::{ConfigError, SchedulerConfig};
pub use scheduler::Scheduler;
pub use operation::{CompletionOp, OpPhase, Operation};
pub use work::WorkGuard;
pub use executor::{
    AnyExecutor, Executor, InlineExecutor, IoExecutor, SystemExecutor, Target, TracingExecutor, Work,
};
pub use dispatcher::HandlerDispatcher;
pub use worker::{ThreadPool, WorkerPool};
pub use offload::{OffloadOp, OffloadService};
pub use timer::{DeadlineTimer, TimerHandle, TimerStats};
