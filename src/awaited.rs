//! Awaited-result wrapper: explicit `Result` pattern matching for
//! outcome-producing futures.
//!
//! Some callers prefer to match on value/error/cancellation explicitly
//! rather than thread the tri-state [`Outcome`] through their code.
//! [`awaited`] adapts any outcome-producing future, a scope task or
//! otherwise, into one that yields `Result<T, ScopeError<E>>`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::ScopeError;
use crate::outcome::Outcome;

/// Future adapter produced by [`awaited`].
#[must_use = "futures do nothing unless awaited"]
pub struct Awaited<T, E> {
    inner: Pin<Box<dyn Future<Output = Outcome<T, E>> + Send + 'static>>,
}

/// Adapts an outcome-producing future into a `Result`-producing one.
pub fn awaited<T, E, F>(fut: F) -> Awaited<T, E>
where
    F: Future<Output = Outcome<T, E>> + Send + 'static,
{
    Awaited {
        inner: Box::pin(fut),
    }
}

impl<T, E> Future for Awaited<T, E> {
    type Output = Result<T, ScopeError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut()
            .inner
            .as_mut()
            .poll(cx)
            .map(Outcome::into_result)
    }
}
