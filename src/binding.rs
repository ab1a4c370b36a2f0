//! Binding classification for caller-supplied scope arguments.
//!
//! Each argument bound into a scope gets exactly one [`BindingDescriptor`]
//! at construction time, immutable thereafter: its kind, its safety level,
//! and where its storage lives. The descriptors are processed as an
//! ordered sequence (construction order is declaration order, left to
//! right), and their joined safety levels become the scope's aggregate.
//!
//! Storage placement follows two rules:
//!
//! - anything that must stay addressable across suspension (cleanup-capable
//!   arguments, self-references, re-bound captures) is heap-stable;
//! - plain owned arguments start inline, but are promoted into the shared
//!   arena when the scope contains any heap-stable argument, so all owned
//!   storage co-locates.

use serde::{Deserialize, Serialize};

use crate::safety::Safety;

/// How an argument is bound into the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    /// A plain owned value with no cleanup hook.
    OwnedValue,
    /// An owned value with a registered async cleanup hook.
    OwnedWithCleanup,
    /// A handle to the scope itself, used by recursive or self-scheduling
    /// computations.
    SelfRef,
    /// A reference-like binding whose referent the caller (or an ancestor
    /// scope) owns.
    ByRef,
}

/// Where the bound argument's storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    /// Moved directly into the inner computation.
    Inline,
    /// Owned by the scope's arena; address stable across suspension.
    HeapStable,
}

/// Classification of one bound argument. Created once, never mutated
/// after storage resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDescriptor {
    /// Zero-based bind position (construction order).
    pub index: usize,
    /// How the argument is bound.
    pub kind: BindingKind,
    /// The argument's aliasing-safety level.
    pub safety: Safety,
    /// Where the argument's storage lives.
    pub storage: StorageClass,
}

impl BindingDescriptor {
    /// Classifies a plain owned value at the given safety level.
    #[must_use]
    pub(crate) const fn owned_value(index: usize, safety: Safety) -> Self {
        Self {
            index,
            kind: BindingKind::OwnedValue,
            safety,
            storage: StorageClass::Inline,
        }
    }

    /// Classifies an owned value carrying a cleanup hook. Always
    /// heap-stable: its address must survive until the hook has run.
    #[must_use]
    pub(crate) const fn owned_with_cleanup(index: usize) -> Self {
        Self {
            index,
            kind: BindingKind::OwnedWithCleanup,
            safety: Safety::MaybeValue,
            storage: StorageClass::HeapStable,
        }
    }

    /// Classifies a scope self-reference. Always heap-stable.
    #[must_use]
    pub(crate) const fn self_ref(index: usize) -> Self {
        Self {
            index,
            kind: BindingKind::SelfRef,
            safety: Safety::CleanupSafeRef,
            storage: StorageClass::HeapStable,
        }
    }

    /// Classifies a reference-like binding at the declared safety level.
    ///
    /// A reference valid until cleanup completes points into arena
    /// storage, so it is heap-stable; every other declared level passes
    /// through inline.
    #[must_use]
    pub(crate) const fn by_ref(index: usize, safety: Safety) -> Self {
        let storage = match safety {
            Safety::CleanupSafeRef => StorageClass::HeapStable,
            _ => StorageClass::Inline,
        };
        Self {
            index,
            kind: BindingKind::ByRef,
            safety,
            storage,
        }
    }
}

/// A value with an explicitly vouched-for safety level.
///
/// This is the escape hatch for reference-like arguments the classifier
/// cannot see through: the caller attaches the level they can prove, and
/// should leave a comment at the call site explaining why the marking is
/// sound. Marking a value `Unsafe` is honest but restrictive: a guarded
/// builder rejects it, and an unguarded builder can only release the
/// immovable task flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marked<T> {
    value: T,
    safety: Safety,
}

impl<T> Marked<T> {
    /// Attaches `safety` to `value`.
    #[must_use]
    pub const fn new(value: T, safety: Safety) -> Self {
        Self { value, safety }
    }

    /// The vouched-for safety level.
    #[must_use]
    pub const fn safety(&self) -> Safety {
        self.safety
    }

    /// Unwraps the marked value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> std::ops::Deref for Marked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> std::ops::DerefMut for Marked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// Resolves final storage placement across all descriptors.
///
/// If any argument is heap-stable (or the configuration forces an arena),
/// the cell-backed owned-value arguments listed in `promotable` move into
/// the shared arena too. Returns whether the scope demands an arena.
pub(crate) fn resolve_storage(
    descriptors: &mut [BindingDescriptor],
    promotable: &[usize],
    force_arena: bool,
) -> bool {
    let heap_present = descriptors
        .iter()
        .any(|d| d.storage == StorageClass::HeapStable);
    let demand = heap_present || force_arena;
    if demand {
        for &index in promotable {
            descriptors[index].storage = StorageClass::HeapStable;
        }
    }
    demand
}
