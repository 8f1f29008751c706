//! # iosched-core
//!
//! Core types for the iosched asynchronous I/O execution engine.
//!
//! This crate is platform-agnostic and holds no threads or queues.
//! The scheduler, executors and worker threads live in `iosched-runtime`;
//! concrete blocking backends live in `iosched-net`.
//!
//! ## Modules
//!
//! - `id` - Execution context identifier
//! - `error` - Error taxonomy and fatal contract violations
//! - `cancel` - Weak cancellation tokens
//! - `blocking` - Blocking category of submitted work
//! - `capability` - Runtime capability queries on executors
//! - `backend` - Interfaces of the blocking backends

pub mod id;
pub mod error;
pub mod cancel;
pub mod blocking;
pub mod capability;
pub mod backend;

// Re-exports for convenience
pub use id::ContextId;
pub use error::{BackendError, ContractViolation, IoError, IoResult};
pub use cancel::{CancelSource, CancelToken};
pub use blocking::Blocking;
pub use capability::{Capability, CapabilityValue, OutstandingWork, Relationship};
pub use backend::{AddressFamily, HostInfo, ResolveBackend, ResolveFlags, ResolveQuery, StreamBackend};
