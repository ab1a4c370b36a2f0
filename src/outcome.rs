//! Tri-state outcome of a scope's inner computation.
//!
//! The outcome represents how an asynchronous unit of work finished:
//!
//! - `Value(T)`: success with a value
//! - `Error(E)`: application failure, carrying exactly one error
//! - `Cancelled(CancelReason)`: the work was cancelled
//!
//! Exactly one state holds at any time, and exactly one of the three is
//! ever observable to a scope's caller. Anything awaitable by the scope
//! machinery conforms to the "awaitable producing an outcome" contract:
//! a future whose output converts into `Outcome` via [`IntoOutcome`].

use core::fmt;

use crate::cancel::CancelReason;
use crate::error::ScopeError;

/// The tri-state outcome of a scope or inner computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// Success with a value.
    Value(T),
    /// Application-level failure.
    Error(E),
    /// The computation was cancelled.
    Cancelled(CancelReason),
}

impl<T, E> Outcome<T, E> {
    /// Returns true if this outcome is `Value`.
    #[must_use]
    pub const fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns true if this outcome is `Error`.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns true if this outcome is `Cancelled`.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Maps the success value using the provided function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U, E> {
        match self {
            Self::Value(v) => Outcome::Value(f(v)),
            Self::Error(e) => Outcome::Error(e),
            Self::Cancelled(r) => Outcome::Cancelled(r),
        }
    }

    /// Maps the error value using the provided function.
    pub fn map_err<F2, G: FnOnce(E) -> F2>(self, g: G) -> Outcome<T, F2> {
        match self {
            Self::Value(v) => Outcome::Value(v),
            Self::Error(e) => Outcome::Error(g(e)),
            Self::Cancelled(r) => Outcome::Cancelled(r),
        }
    }

    /// Converts this outcome into a standard `Result`, folding failure and
    /// cancellation into [`ScopeError`] for explicit pattern matching.
    pub fn into_result(self) -> Result<T, ScopeError<E>> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Error(e) => Err(ScopeError::Failed(e)),
            Self::Cancelled(r) => Err(ScopeError::Cancelled(r)),
        }
    }

    /// Returns the success value or panics.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is not `Value`.
    #[track_caller]
    pub fn unwrap(self) -> T
    where
        E: fmt::Debug,
    {
        match self {
            Self::Value(v) => v,
            Self::Error(e) => panic!("called `Outcome::unwrap()` on an `Error` value: {e:?}"),
            Self::Cancelled(r) => {
                panic!("called `Outcome::unwrap()` on a `Cancelled` value: {r:?}")
            }
        }
    }

    /// Returns the error or panics.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is not `Error`.
    #[track_caller]
    pub fn unwrap_err(self) -> E
    where
        T: fmt::Debug,
    {
        match self {
            Self::Value(v) => panic!("called `Outcome::unwrap_err()` on a `Value`: {v:?}"),
            Self::Error(e) => e,
            Self::Cancelled(r) => {
                panic!("called `Outcome::unwrap_err()` on a `Cancelled` value: {r:?}")
            }
        }
    }

    /// Returns the success value or a default.
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Self::Value(v) => v,
            _ => default,
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Self::Value(v),
            Err(e) => Self::Error(e),
        }
    }
}

/// Conversion into an [`Outcome`], the contract every inner computation's
/// output satisfies.
///
/// Implemented for `Outcome` itself (identity) and for `Result`, so inner
/// computations may be written in either style.
pub trait IntoOutcome<T, E> {
    /// Performs the conversion.
    fn into_outcome(self) -> Outcome<T, E>;
}

impl<T, E> IntoOutcome<T, E> for Outcome<T, E> {
    fn into_outcome(self) -> Outcome<T, E> {
        self
    }
}

impl<T, E> IntoOutcome<T, E> for Result<T, E> {
    fn into_outcome(self) -> Outcome<T, E> {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelKind;

    // =========================================================================
    // Predicate Tests
    // =========================================================================

    #[test]
    fn exactly_one_predicate_holds() {
        let value: Outcome<i32, &str> = Outcome::Value(42);
        let error: Outcome<i32, &str> = Outcome::Error("boom");
        let cancelled: Outcome<i32, &str> = Outcome::Cancelled(CancelReason::default());

        assert!(value.is_value() && !value.is_error() && !value.is_cancelled());
        assert!(!error.is_value() && error.is_error() && !error.is_cancelled());
        assert!(!cancelled.is_value() && !cancelled.is_error() && cancelled.is_cancelled());
    }

    // =========================================================================
    // Map / Conversion Tests
    // =========================================================================

    #[test]
    fn map_transforms_value_only() {
        let value: Outcome<i32, &str> = Outcome::Value(21);
        assert_eq!(value.map(|x| x * 2), Outcome::Value(42));

        let error: Outcome<i32, &str> = Outcome::Error("boom");
        assert_eq!(error.map(|x| x * 2), Outcome::Error("boom"));
    }

    #[test]
    fn map_err_transforms_error_only() {
        let error: Outcome<i32, &str> = Outcome::Error("short");
        assert_eq!(error.map_err(str::len), Outcome::Error(5));

        let cancelled: Outcome<i32, &str> = Outcome::Cancelled(CancelReason::timeout());
        assert!(cancelled.map_err(str::len).is_cancelled());
    }

    #[test]
    fn into_result_splits_three_ways() {
        let value: Outcome<i32, &str> = Outcome::Value(42);
        assert_eq!(value.into_result(), Ok(42));

        let error: Outcome<i32, &str> = Outcome::Error("boom");
        assert_eq!(error.into_result(), Err(ScopeError::Failed("boom")));

        let cancelled: Outcome<i32, &str> = Outcome::Cancelled(CancelReason::timeout());
        match cancelled.into_result() {
            Err(ScopeError::Cancelled(r)) => assert_eq!(r.kind, CancelKind::Timeout),
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[test]
    fn from_result_round_trip() {
        let ok: Outcome<i32, &str> = Ok(7).into();
        assert_eq!(ok, Outcome::Value(7));
        let err: Outcome<i32, &str> = Err("boom").into();
        assert_eq!(err, Outcome::Error("boom"));
    }

    // =========================================================================
    // Unwrap Tests
    // =========================================================================

    #[test]
    fn unwrap_returns_value() {
        let value: Outcome<i32, &str> = Outcome::Value(42);
        assert_eq!(value.unwrap(), 42);
    }

    #[test]
    #[should_panic(expected = "called `Outcome::unwrap()` on an `Error` value")]
    fn unwrap_panics_on_error() {
        let error: Outcome<i32, &str> = Outcome::Error("boom");
        let _ = error.unwrap();
    }

    #[test]
    #[should_panic(expected = "called `Outcome::unwrap_err()` on a `Value`")]
    fn unwrap_err_panics_on_value() {
        let value: Outcome<i32, &str> = Outcome::Value(42);
        let _ = value.unwrap_err();
    }

    #[test]
    fn unwrap_or_returns_default_on_cancellation() {
        let cancelled: Outcome<i32, &str> = Outcome::Cancelled(CancelReason::default());
        assert_eq!(cancelled.unwrap_or(99), 99);
    }
}
