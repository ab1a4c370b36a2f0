//! The two task flavors a scope can release.
//!
//! - [`ScopeTask`]: movable and storable. Only released when the safety
//!   gate passed; carries the scope's aggregate safety as a capability
//!   tag, so it can be re-bound into a parent scope at an honest level.
//! - [`NowTask`]: the immovable flavor. Always constructible, regardless
//!   of aggregate safety, but never transferable: it is `!Send`, must not
//!   be stored, and is meant to be awaited in the expression that created
//!   it.
//!
//! Both produce the tri-state [`Outcome`] when awaited.

use core::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::outcome::Outcome;
use crate::safety::Safety;
use crate::scope::ScopeFuture;

/// A movable, storable scope task.
///
/// Released by [`Built::release`] only when the aggregate argument safety
/// and the inner computation's declared safety both pass the gate.
///
/// [`Built::release`]: crate::scope::Built::release
#[must_use = "a scope task does nothing until awaited"]
pub struct ScopeTask<T, E> {
    fut: ScopeFuture<T, E>,
    safety: Safety,
}

impl<T, E> ScopeTask<T, E> {
    pub(crate) fn new(fut: ScopeFuture<T, E>, safety: Safety) -> Self {
        Self { fut, safety }
    }

    /// The capability tag: the join of all bound arguments' safety levels.
    #[must_use]
    pub fn safety(&self) -> Safety {
        self.safety
    }

    /// True if this task's scope allocated a storage arena.
    #[must_use]
    pub fn used_arena(&self) -> bool {
        self.fut.used_arena()
    }
}

// The phase machine only ever needs `&mut`: every future it drives is
// separately heap-pinned, so the machine itself is address-insensitive.
impl<T, E> Unpin for ScopeTask<T, E> {}

impl<T, E: Clone> Future for ScopeTask<T, E> {
    type Output = Outcome<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().fut.poll_scope(cx)
    }
}

impl<T, E> fmt::Debug for ScopeTask<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeTask")
            .field("safety", &self.safety)
            .finish_non_exhaustive()
    }
}

/// An immovable, immediately-awaited scope task.
///
/// This flavor is always available, even for scopes whose aggregate
/// safety is `Unsafe`, because awaiting where created keeps control flow
/// and lifetime in the same lexical scope. It cannot cross threads
/// (`!Send`) and should not be stored; await it in the expression that
/// produced it.
#[must_use = "a now-task must be awaited where it was created"]
pub struct NowTask<T, E> {
    fut: ScopeFuture<T, E>,
    /// Pins this flavor to the creating thread.
    _not_send: PhantomData<*const ()>,
}

impl<T, E> NowTask<T, E> {
    pub(crate) fn new(fut: ScopeFuture<T, E>) -> Self {
        Self {
            fut,
            _not_send: PhantomData,
        }
    }

    /// True if this task's scope allocated a storage arena.
    #[must_use]
    pub fn used_arena(&self) -> bool {
        self.fut.used_arena()
    }
}

impl<T, E> Unpin for NowTask<T, E> {}

impl<T, E: Clone> Future for NowTask<T, E> {
    type Output = Outcome<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().fut.poll_scope(cx)
    }
}

impl<T, E> fmt::Debug for NowTask<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NowTask").finish_non_exhaustive()
    }
}
