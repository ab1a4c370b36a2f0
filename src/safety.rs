//! Aliasing-safety lattice for scope arguments and inner computations.
//!
//! Every argument bound into a scope, and the scope's inner computation
//! itself, carries a [`Safety`] level describing how long any references it
//! bears remain valid relative to the scope's execution phases. The levels
//! form a total order from least to most safe:
//!
//! `Unsafe < ScopeInternal < CleanupSafeRef < AfterCleanupRef < MaybeValue < Value`
//!
//! Aggregation uses the lattice [`join`]: the least safe input wins. A
//! scope's aggregate safety is the join across all of its bound arguments,
//! and it decides which task flavor the safety gate may release.
//!
//! Only the scope machinery assigns the middle levels. User code normally
//! deals in `Value`, `MaybeValue`, and (via explicit marking) `Unsafe`.

use core::fmt;
use serde::{Deserialize, Serialize};

/// An aliasing-safety level.
///
/// Ordered least safe to most safe; always gate with `>=`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Safety {
    /// Definitely carries aliasing; nothing is known about the lifetime.
    /// Raw borrows and unmarked handles land here.
    #[default]
    Unsafe,
    /// Reserved for inner computations built for a specific scope. Treated
    /// as unsafe by everything except the scope that created them.
    ScopeInternal,
    /// A reference that stays valid until the current scope's cleanup
    /// sequence has completed. Safe to pass to sub-scopes and to cleanup
    /// hooks of the same scope; never safe to return to an ancestor.
    CleanupSafeRef,
    /// A reference whose referent is only guaranteed once cleanup has
    /// finished. Safe to hand to code that runs strictly after the cleanup
    /// sequence.
    AfterCleanupRef,
    /// Behaves like a value, but may transitively carry references that the
    /// heuristic cannot see (a nested scope task, for example).
    MaybeValue,
    /// A plain value: alive for as long as it is held.
    Value,
}

impl Safety {
    /// Minimum aggregate argument safety for releasing a movable task.
    pub const SHAREABLE_MIN: Self = Self::CleanupSafeRef;

    /// Minimum declared inner-computation safety for releasing a movable
    /// task.
    pub const INNER_MIN: Self = Self::ScopeInternal;

    /// Returns true if an aggregate at this level may back a movable task.
    #[must_use]
    pub const fn is_shareable(self) -> bool {
        self as u8 >= Self::SHAREABLE_MIN as u8
    }

    /// Short lower-case name, matching the serialized form.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unsafe => "unsafe",
            Self::ScopeInternal => "scope_internal",
            Self::CleanupSafeRef => "cleanup_safe_ref",
            Self::AfterCleanupRef => "after_cleanup_ref",
            Self::MaybeValue => "maybe_value",
            Self::Value => "value",
        }
    }
}

impl fmt::Display for Safety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Joins a sequence of safety levels: the least safe input wins.
///
/// The empty join is [`Safety::Value`], the identity of the operation.
/// Pure and total; used to compute a scope's aggregate safety and to
/// validate an inner computation against the gate thresholds.
pub fn join<I>(levels: I) -> Safety
where
    I: IntoIterator<Item = Safety>,
{
    levels.into_iter().fold(Safety::Value, Safety::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Lattice Ordering Tests
    // =========================================================================

    #[test]
    fn levels_are_totally_ordered() {
        assert!(Safety::Unsafe < Safety::ScopeInternal);
        assert!(Safety::ScopeInternal < Safety::CleanupSafeRef);
        assert!(Safety::CleanupSafeRef < Safety::AfterCleanupRef);
        assert!(Safety::AfterCleanupRef < Safety::MaybeValue);
        assert!(Safety::MaybeValue < Safety::Value);
    }

    #[test]
    fn shareable_threshold_splits_the_order() {
        assert!(!Safety::Unsafe.is_shareable());
        assert!(!Safety::ScopeInternal.is_shareable());
        assert!(Safety::CleanupSafeRef.is_shareable());
        assert!(Safety::AfterCleanupRef.is_shareable());
        assert!(Safety::MaybeValue.is_shareable());
        assert!(Safety::Value.is_shareable());
    }

    // =========================================================================
    // Join Tests (Lattice Laws)
    // =========================================================================

    #[test]
    fn join_returns_minimum() {
        let joined = join([Safety::Value, Safety::CleanupSafeRef, Safety::MaybeValue]);
        assert_eq!(joined, Safety::CleanupSafeRef);
    }

    #[test]
    fn join_of_empty_is_value() {
        assert_eq!(join([]), Safety::Value);
    }

    #[test]
    fn join_is_idempotent() {
        for level in [
            Safety::Unsafe,
            Safety::ScopeInternal,
            Safety::CleanupSafeRef,
            Safety::AfterCleanupRef,
            Safety::MaybeValue,
            Safety::Value,
        ] {
            assert_eq!(join([level, level]), level);
        }
    }

    #[test]
    fn join_unsafe_dominates() {
        let joined = join([Safety::Value, Safety::Unsafe, Safety::MaybeValue]);
        assert_eq!(joined, Safety::Unsafe);
    }

    #[test]
    fn join_is_commutative() {
        let a = join([Safety::MaybeValue, Safety::AfterCleanupRef]);
        let b = join([Safety::AfterCleanupRef, Safety::MaybeValue]);
        assert_eq!(a, b);
    }

    // =========================================================================
    // Display / Serialization Tests
    // =========================================================================

    #[test]
    fn display_matches_name() {
        assert_eq!(Safety::CleanupSafeRef.to_string(), "cleanup_safe_ref");
        assert_eq!(Safety::Value.to_string(), "value");
    }

    #[test]
    fn serde_round_trip() {
        let json = serde_json::to_string(&Safety::AfterCleanupRef).expect("serialize");
        assert_eq!(json, "\"after_cleanup_ref\"");
        let back: Safety = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Safety::AfterCleanupRef);
    }
}
