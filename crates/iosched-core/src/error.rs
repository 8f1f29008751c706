//! Error types for the iosched engine
//!
//! Three kinds of failure reach callers as values:
//!
//! - `IoError::Canceled` - the operation was aborted through its cancellation token
//! - `IoError::BackendFailure` - the blocking backend reported an error
//! - `IoError::ResourceExhausted` - a new operation could not be admitted
//!
//! The first two are delivered to the completion handler. The third is
//! returned to the submitter, because no handler has been taken yet.
//!
//! Engine bugs (double completion, double release, illegal phase
//! transitions) are `ContractViolation`s. They are never returned; they
//! halt through [`ContractViolation::fatal`].

use thiserror::Error;

/// Result type for engine operations
pub type IoResult<T> = Result<T, IoError>;

/// Errors delivered by the engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    /// Operation was aborted via its cancellation token
    #[error("operation canceled")]
    Canceled,

    /// The blocking backend failed
    #[error("backend failure: {0}")]
    BackendFailure(#[from] BackendError),

    /// Admission limit reached; the operation was not submitted
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
}

impl IoError {
    /// True if this is the cancellation error
    #[inline]
    pub fn is_canceled(&self) -> bool {
        matches!(self, IoError::Canceled)
    }
}

/// Failure codes reported by blocking backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Host not found (authoritative)
    #[error("host not found")]
    HostNotFound,

    /// Host not found (non-authoritative), retry may succeed
    #[error("host not found, try again")]
    TryAgain,

    /// Service name is not known for the socket type
    #[error("service not found")]
    ServiceNotFound,

    /// Name is valid but has no data of the requested type
    #[error("no data record of requested type")]
    NoData,

    /// Peer closed the stream
    #[error("end of file")]
    Eof,

    /// OS error with errno
    #[error("os error {0}")]
    Os(i32),

    /// I/O error without an OS code
    #[error("i/o error: {0:?}")]
    Io(std::io::ErrorKind),

    /// Resolver library error code with no dedicated variant
    #[error("resolver error {0}")]
    Resolver(i32),

    /// The backend panicked during the blocking call
    #[error("backend panicked")]
    Panicked,
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return BackendError::Eof;
        }
        match e.raw_os_error() {
            Some(code) => BackendError::Os(code),
            None => BackendError::Io(e.kind()),
        }
    }
}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::BackendFailure(e.into())
    }
}

/// Programming errors inside the engine
///
/// These describe broken invariants, not runtime conditions. Callers are
/// not expected to handle them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContractViolation {
    /// An operation's completion entry point ran a second time
    #[error("operation completed twice")]
    DoubleCompletion,

    /// A work guard was released twice
    #[error("work guard released twice")]
    DoubleRelease,

    /// An operation phase transition that the state machine forbids
    #[error("illegal operation transition {from} -> {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },

    /// Outstanding work count went below zero
    #[error("outstanding work underflow")]
    WorkUnderflow,
}

impl ContractViolation {
    /// Halt. Logged at error level first so the cause survives in the logs.
    #[cold]
    #[track_caller]
    pub fn fatal(self) -> ! {
        log::error!("contract violation: {}", self);
        panic!("contract violation: {}", self);
    }
}
