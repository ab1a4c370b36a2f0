//! Error types for scope construction and scope results.
//!
//! Construction-time problems are typed and surface synchronously, before
//! any execution begins; they are never deferred into the returned task:
//!
//! - [`BuildError::UnsafeArgumentRejected`]: an argument marked `Unsafe`
//!   was bound into a guarded builder.
//! - [`BuildError::BelowShareableThreshold`] /
//!   [`BuildError::UntrustedInner`]: the safety gate refused to release a
//!   movable task.
//!
//! Runtime failure of the finished scope is carried by [`ScopeError`],
//! the two-sided error half of [`Outcome::into_result`].
//!
//! Cleanup hooks must not fail: a fault raised inside one is a defect in
//! the hook, not a recoverable scope-level condition, and propagates as a
//! panic, deliberately distinct from the ordinary error channel.
//!
//! [`Outcome::into_result`]: crate::outcome::Outcome::into_result

use thiserror::Error;

use crate::cancel::CancelReason;
use crate::safety::Safety;

/// A construction-time safety violation. Never retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BuildError {
    /// An argument explicitly marked `Unsafe` was bound into a guarded
    /// builder. Only unguarded builders accept such arguments, and they
    /// can release nothing but the immovable task flavor.
    #[error(
        "argument {index} is marked `{safety}`; a guarded scope rejects unsafe \
         arguments (use an unguarded builder and release an immovable task)"
    )]
    UnsafeArgumentRejected {
        /// Zero-based bind position of the offending argument.
        index: usize,
        /// The safety level the argument was marked with.
        safety: Safety,
    },

    /// The aggregate argument safety is below the shareable threshold, so
    /// only an immovable task may be released.
    #[error(
        "aggregate argument safety `{aggregate}` is below the shareable \
         threshold `{required}`; only an immovable task can be released"
    )]
    BelowShareableThreshold {
        /// Join of all bound arguments' safety levels.
        aggregate: Safety,
        /// The gate's minimum, [`Safety::SHAREABLE_MIN`].
        required: Safety,
    },

    /// The inner computation's declared safety is too low for a movable
    /// task. Untrusted futures can only back the immovable flavor.
    #[error(
        "inner computation declares `{declared}` safety; a shareable scope \
         requires at least `{required}`"
    )]
    UntrustedInner {
        /// Safety level the inner computation was declared with.
        declared: Safety,
        /// The gate's minimum, [`Safety::INNER_MIN`].
        required: Safety,
    },
}

/// The failure half of a scope outcome, for callers that prefer explicit
/// `Result` pattern matching over the tri-state [`Outcome`].
///
/// [`Outcome`]: crate::outcome::Outcome
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError<E> {
    /// The inner computation (or cancellation delivery) failed.
    #[error("scope failed: {0}")]
    Failed(E),
    /// The inner computation was cancelled.
    #[error("scope cancelled: {0}")]
    Cancelled(CancelReason),
}

impl<E> ScopeError<E> {
    /// Returns the application error, if this is the `Failed` side.
    pub fn into_failed(self) -> Option<E> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Cancelled(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_error_messages_name_the_levels() {
        let err = BuildError::BelowShareableThreshold {
            aggregate: Safety::Unsafe,
            required: Safety::SHAREABLE_MIN,
        };
        let msg = err.to_string();
        assert!(msg.contains("unsafe"));
        assert!(msg.contains("cleanup_safe_ref"));
    }

    #[test]
    fn unsafe_argument_rejection_names_the_index() {
        let err = BuildError::UnsafeArgumentRejected {
            index: 2,
            safety: Safety::Unsafe,
        };
        assert!(err.to_string().contains("argument 2"));
    }

    #[test]
    fn scope_error_sides() {
        let failed: ScopeError<&str> = ScopeError::Failed("boom");
        assert_eq!(failed.into_failed(), Some("boom"));

        let cancelled: ScopeError<&str> = ScopeError::Cancelled(CancelReason::timeout());
        assert_eq!(cancelled.into_failed(), None);
    }
}
