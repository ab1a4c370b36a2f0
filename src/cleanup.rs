//! Cleanup orchestration: one task per hook, run in reverse order.
//!
//! The orchestrator materializes every cleanup task when its argument is
//! bound, before the inner computation is ever polled, so a mid-flight
//! allocation failure while building cleanup tasks can never leave an
//! already-constructed argument without its hook. The tasks are held in
//! construction order and drained from the back: the logical reversal the
//! ordering contract requires.
//!
//! Contract enforced here:
//!
//! - cleanups run strictly sequentially, most recently constructed first;
//! - every hook sees the scope's first recorded error (or `None`);
//! - the argument's value is restored into its cell after the hook, so no
//!   destructor fires before the whole sequence has completed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use smallvec::SmallVec;

use crate::arena::ErrorCell;
use crate::capability::Cleanup;
use crate::capture::CaptureCell;

pub(crate) type CleanupFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// One materialized cleanup task, tagged with its argument's bind index.
pub(crate) struct CleanupTask {
    index: usize,
    fut: CleanupFuture,
}

/// Builds the cleanup task for one owned argument.
///
/// The task takes the value out of its cell for the duration of the hook
/// and restores it afterwards; the cell (and thus the destructor) is
/// released later, by the arena, once every sibling hook has finished.
pub(crate) fn make_cleanup_task<T, E>(
    index: usize,
    cell: Arc<CaptureCell<T>>,
    errors: Arc<ErrorCell<E>>,
) -> CleanupTask
where
    T: Cleanup<E>,
    E: Send + Sync + 'static,
{
    let fut = Box::pin(async move {
        tracing::trace!(argument = index, "running cleanup hook");
        let mut value = cell.take_for_cleanup();
        value.cleanup(errors.get()).await;
        cell.restore(value);
    });
    CleanupTask { index, fut }
}

/// The ordered cleanup sequence of one scope.
///
/// Tasks are pushed in argument construction order and drained strictly
/// sequentially from the back.
pub(crate) struct CleanupQueue {
    tasks: SmallVec<[CleanupTask; 4]>,
}

impl CleanupQueue {
    pub(crate) fn new() -> Self {
        Self {
            tasks: SmallVec::new(),
        }
    }

    pub(crate) fn push(&mut self, task: CleanupTask) {
        self.tasks.push(task);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Drives the remaining cleanup tasks, newest argument first.
    ///
    /// Returns `Ready` once every task has completed. A task is dropped as
    /// soon as it finishes; the values it touched stay alive in the arena.
    pub(crate) fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        while let Some(task) = self.tasks.last_mut() {
            match task.fut.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(()) => {
                    let finished = self.tasks.pop().expect("task observed above");
                    tracing::trace!(argument = finished.index, "cleanup hook finished");
                }
            }
        }
        Poll::Ready(())
    }
}
