//! Cancellation reason types and the ambient cancellation token.
//!
//! A scope never invents cancellation semantics of its own. It relays a
//! single ambient [`CancelToken`] to arguments that opted in, and it relays
//! a [`CancelReason`] produced by the inner computation to its caller. How
//! the inner computation reacts to the token is entirely its own contract.

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// The kind of cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CancelKind {
    /// Explicit cancellation requested by user code.
    User,
    /// Cancellation due to a timeout or deadline.
    Timeout,
    /// Cancellation because an enclosing scope is shutting down.
    ParentScope,
    /// Cancellation due to process or runtime shutdown.
    Shutdown,
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Timeout => write!(f, "timeout"),
            Self::ParentScope => write!(f, "parent scope"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// The reason for a cancellation, including kind and optional context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelReason {
    /// The kind of cancellation.
    pub kind: CancelKind,
    /// Optional human-readable message (static for determinism).
    pub message: Option<&'static str>,
}

impl CancelReason {
    /// Creates a new cancellation reason with the given kind.
    #[must_use]
    pub const fn new(kind: CancelKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a user cancellation reason with a message.
    #[must_use]
    pub const fn user(message: &'static str) -> Self {
        Self {
            kind: CancelKind::User,
            message: Some(message),
        }
    }

    /// Creates a timeout cancellation reason.
    #[must_use]
    pub const fn timeout() -> Self {
        Self::new(CancelKind::Timeout)
    }

    /// Creates a parent-scope cancellation reason.
    #[must_use]
    pub const fn parent_scope() -> Self {
        Self::new(CancelKind::ParentScope)
    }

    /// Creates a shutdown cancellation reason.
    #[must_use]
    pub const fn shutdown() -> Self {
        Self::new(CancelKind::Shutdown)
    }
}

impl Default for CancelReason {
    fn default() -> Self {
        Self::new(CancelKind::User)
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message {
            Some(msg) => write!(f, "{} ({msg})", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[derive(Debug, Default)]
struct TokenState {
    cancelled: AtomicBool,
    reason: Mutex<Option<CancelReason>>,
}

/// The ambient cancellation signal a scope may relay to its arguments.
///
/// Cloning is cheap and shares state: cancelling any clone cancels them
/// all. The token is level-triggered; once cancelled it stays cancelled,
/// and the first recorded reason wins.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<TokenState>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation with the given reason.
    ///
    /// Returns `true` if this call was the one that cancelled the token.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        let mut slot = self.state.reason.lock();
        if self.state.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        *slot = Some(reason);
        true
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Returns the recorded cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<CancelReason> {
        self.state.reason.lock().clone()
    }
}
