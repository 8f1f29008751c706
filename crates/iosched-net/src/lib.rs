//! # iosched-net
//!
//! Network-facing operations built on the iosched runtime.
//!
//! - `resolver` - asynchronous forward and reverse name resolution
//! - `system` - resolver backend using the operating system
//! - `stream` - asynchronous reads and writes over a blocking stream
//! - `testing` - fake backends (tests and the `test-util` feature)

pub mod resolver;
pub mod system;
pub mod stream;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use resolver::{Resolver, ResolverEntry, ResolverResults};
pub use system::SystemResolver;
pub use stream::StreamHandle;
