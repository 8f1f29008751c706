//! Cancellation tokens for cooperative cancellation
//!
//! A [`CancelSource`] owns the cancellation state of a resource (a
//! resolver, a stream handle). Operations started on that resource hold a
//! [`CancelToken`], a weak reference to the same state.
//!
//! A token reports canceled when:
//! - its source (or one of the source's ancestors) was canceled,
//! - `cancel()` was called through any token of the source,
//! - the source was dropped (the resource is gone, nothing to finish for).
//!
//! Canceling never frees anything. It only sets a flag that blocking
//! backends check at their next safe checkpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::error::{IoError, IoResult};

struct CancelState {
    /// Cancellation flag
    canceled: AtomicBool,

    /// Parent source state (if any)
    parent: Option<Arc<CancelState>>,
}

impl CancelState {
    fn is_canceled(&self) -> bool {
        if self.canceled.load(Ordering::Acquire) {
            return true;
        }
        match self.parent {
            Some(ref parent) => parent.is_canceled(),
            None => false,
        }
    }
}

/// Owning side of a cancellation state
///
/// Dropping the source invalidates every token handed out from it.
pub struct CancelSource {
    state: Arc<CancelState>,
}

impl CancelSource {
    /// Create a new independent source
    pub fn new() -> Self {
        Self {
            state: Arc::new(CancelState {
                canceled: AtomicBool::new(false),
                parent: None,
            }),
        }
    }

    /// Create a child source linked to this one
    ///
    /// Canceling this source cancels the child. Canceling the child does
    /// not affect this source.
    pub fn child(&self) -> Self {
        Self {
            state: Arc::new(CancelState {
                canceled: AtomicBool::new(false),
                parent: Some(Arc::clone(&self.state)),
            }),
        }
    }

    /// Hand out a weak token for an operation
    pub fn token(&self) -> CancelToken {
        CancelToken {
            state: Some(Arc::downgrade(&self.state)),
        }
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.state.canceled.store(true, Ordering::Release);
    }

    /// Check if cancellation was requested (own flag or any ancestor)
    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.state.is_canceled()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelSource")
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// Weak, non-owning cancellation handle
///
/// Cheap to clone and safe to send to other threads. Holding a token does
/// not keep the resource or its cancellation state alive.
#[derive(Clone)]
pub struct CancelToken {
    /// `None` for a token that can never be canceled
    state: Option<Weak<CancelState>>,
}

impl CancelToken {
    /// A token with no source; it is never canceled
    pub fn never() -> Self {
        Self { state: None }
    }

    /// Check if cancellation was requested
    ///
    /// A token whose source has been dropped reports canceled.
    #[inline]
    pub fn is_canceled(&self) -> bool {
        match self.state {
            None => false,
            Some(ref weak) => match weak.upgrade() {
                Some(state) => state.is_canceled(),
                None => true,
            },
        }
    }

    /// Request cancellation of the source this token came from
    ///
    /// No-op if the source is already gone (it counts as canceled anyway)
    /// or for a `never()` token.
    pub fn cancel(&self) {
        if let Some(state) = self.state.as_ref().and_then(Weak::upgrade) {
            state.canceled.store(true, Ordering::Release);
        }
    }

    /// Return `Err(IoError::Canceled)` if cancellation was requested
    ///
    /// ```ignore
    /// fn lookup(token: &CancelToken) -> IoResult<Vec<SocketAddr>> {
    ///     token.check()?;
    ///     // ... blocking call ...
    /// }
    /// ```
    #[inline]
    pub fn check(&self) -> IoResult<()> {
        if self.is_canceled() {
            Err(IoError::Canceled)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cancellation() {
        let source = CancelSource::new();
        let token = source.token();

        assert!(!token.is_canceled());
        assert!(token.check().is_ok());

        source.cancel();

        assert!(token.is_canceled());
        assert_eq!(token.check(), Err(IoError::Canceled));
    }

    #[test]
    fn test_cancel_through_token() {
        let source = CancelSource::new();
        let token = source.token();
        let other = source.token();

        token.cancel();
        assert!(source.is_canceled());
        assert!(other.is_canceled());
    }

    #[test]
    fn test_token_does_not_keep_source_alive() {
        let source = CancelSource::new();
        let token = source.token();
        drop(source);

        // Resource gone: nothing left to finish for.
        assert!(token.is_canceled());
        // Canceling through a dangling token is harmless.
        token.cancel();
    }

    #[test]
    fn test_child_source() {
        let parent = CancelSource::new();
        let child = parent.child();
        let token = child.token();

        assert!(!token.is_canceled());
        parent.cancel();
        assert!(child.is_canceled());
        assert!(token.is_canceled());
    }

    #[test]
    fn test_child_independent_cancel() {
        let parent = CancelSource::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_canceled());
        assert!(!parent.is_canceled());
    }

    #[test]
    fn test_never_token() {
        let token = CancelToken::never();
        assert!(!token.is_canceled());
        token.cancel();
        assert!(!token.is_canceled());
    }
}
