//! # iosched - asynchronous I/O execution engine
//!
//! Schedulers, executors and two-phase blocking operations.
//!
//! ## Features
//!
//! - **Scheduler**: any number of threads drive `run`; it returns when
//!   no outstanding work remains or `stop` is called
//! - **Executors**: `never` / `possibly` / `always` blocking categories and
//!   runtime capability queries
//! - **Work guards**: keep a run loop alive with nothing queued
//! - **Two-phase operations**: blocking calls on private worker threads,
//!   handlers delivered back through the bound executor
//! - **Cancellation**: weak tokens, checked before every blocking phase;
//!   deadlines cancel through the same tokens
//!
//! ## Quick Start
//!
//! ```ignore
//! use iosched::{Resolver, Scheduler};
//!
//! let sched = Scheduler::new();
//! let resolver = Resolver::new(&sched);
//!
//! resolver.async_resolve_endpoint("127.0.0.1:80".parse()?, |result| {
//!     match result {
//!         Ok(results) => println!("{:?}", results.first()),
//!         Err(e) => eprintln!("lookup failed: {}", e),
//!     }
//! })?;
//!
//! sched.run();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  User code: post / dispatch / async_resolve / handlers     │
//! └────────────────────────────────────────────────────────────┘
//!               │                              ▲
//!               ▼                              │ dispatch via bound executor
//! ┌───────────────────────────┐     ┌──────────────────────────┐
//! │   Offload service         │     │   Home scheduler         │
//! │   private scheduler       │────>│   ready queue + run loop │
//! │   blocking phase (backend)│ post│   completion phase       │
//! └───────────────────────────┘     └──────────────────────────┘
//!               │
//!               ▼
//!     ResolveBackend / StreamBackend
//! ```

// Re-export core types
pub use iosched_core::{
    AddressFamily,
    BackendError,
    Blocking,
    CancelSource,
    CancelToken,
    Capability,
    CapabilityValue,
    ContextId,
    ContractViolation,
    HostInfo,
    IoError,
    IoResult,
    OutstandingWork,
    Relationship,
    ResolveBackend,
    ResolveFlags,
    ResolveQuery,
    StreamBackend,
};

// Re-export runtime types
pub use iosched_runtime::{
    AnyExecutor,
    CompletionOp,
    ConfigError,
    DeadlineTimer,
    Executor,
    HandlerDispatcher,
    InlineExecutor,
    IoExecutor,
    OffloadOp,
    OffloadService,
    OpPhase,
    Operation,
    Scheduler,
    SchedulerConfig,
    SystemExecutor,
    Target,
    ThreadPool,
    TimerHandle,
    TracingExecutor,
    WorkGuard,
};
pub use iosched_runtime::executor::{defer, dispatch, post};

// Re-export net types
pub use iosched_net::{Resolver, ResolverEntry, ResolverResults, StreamHandle, SystemResolver};

#[cfg(feature = "test-util")]
pub use iosched_net::testing;
