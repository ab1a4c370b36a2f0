//! Optional capability traits for owned scope arguments.
//!
//! An owned argument may opt into either (or both) of two extension
//! points. Dispatch is by explicit capability (the builder methods that
//! register a hook require the corresponding trait bound), never by
//! structural introspection.
//!
//! - [`Cleanup`]: an async teardown routine, run exactly once per scope
//!   execution, in reverse construction order. **Must not fail.**
//! - [`CancelReceptive`]: a synchronous extension point that receives the
//!   ambient cancellation token before the inner computation starts. May
//!   fail, and such a failure is treated like an inner-computation failure.

use std::future::Future;

use crate::cancel::CancelToken;

/// Async cleanup hook for an owned argument.
///
/// The hook receives a read-only reference to the first error recorded by
/// the scope (`None` after a clean run), enabling behavior like best-effort
/// rollback after failure. It must not introduce a second competing error:
/// a fault inside a cleanup hook is a programming error and panics rather
/// than flowing through the scope's error channel.
///
/// The hook runs after the inner computation has finished (by value,
/// failure, or cancellation) and before the owning storage is released,
/// so `self` and everything it owns are still fully valid.
pub trait Cleanup<E>: Send + 'static {
    /// Tears this argument down.
    fn cleanup(&mut self, error: Option<&E>) -> impl Future<Output = ()> + Send;
}

/// Synchronous receiver for the ambient cancellation token.
///
/// Delivery happens once, before the inner computation is first polled,
/// in argument construction order. Returning an error aborts the scope:
/// the inner computation is never invoked, the error becomes the scope's
/// primary error, and cleanup still runs for every owned argument.
pub trait CancelReceptive<E>: Send + 'static {
    /// Accepts the ambient token.
    ///
    /// # Errors
    ///
    /// Any error returned here becomes the scope's first recorded error.
    fn receive_cancellation(&mut self, token: &CancelToken) -> Result<(), E>;
}
