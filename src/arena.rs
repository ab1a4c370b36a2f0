//! Owned, stably-addressed storage for a scope's arguments.
//!
//! The arena owns every argument cell that must stay addressable across
//! suspension points, plus nothing else: the shared first-error cell lives
//! beside it in the scope future so that by-reference bindings (which own
//! no slot here) can still observe it.
//!
//! Two ordering contracts are enforced structurally:
//!
//! - slots are held in construction order, and
//! - `Drop` releases them strictly in **reverse** construction order,
//!
//! so the most recently constructed argument is destroyed first, and only
//! after the scope has finished every cleanup task (the scope drops the
//! arena at the cleanup-to-completed transition).
//!
//! When no argument needs heap-stable storage and no cleanup hook exists,
//! no arena is allocated at all; that is the documented zero-overhead path.

use std::sync::Arc;
use std::sync::OnceLock;

use smallvec::SmallVec;

use crate::capture::CaptureCell;

/// Type-erased holder of one argument cell.
///
/// The entry exists solely to own a strong reference; dropping it in the
/// right order is its entire job.
pub(crate) trait ArenaEntry: Send {}

impl<T: Send> ArenaEntry for Arc<CaptureCell<T>> {}

/// The scope's owned argument storage.
pub(crate) struct Arena {
    slots: SmallVec<[Box<dyn ArenaEntry>; 4]>,
}

impl Arena {
    pub(crate) fn new() -> Self {
        Self {
            slots: SmallVec::new(),
        }
    }

    /// Appends a slot; insertion order is argument construction order.
    pub(crate) fn push(&mut self, entry: Box<dyn ArenaEntry>) {
        self.slots.push(entry);
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // Reverse construction order: last slot in, first slot destroyed.
        while let Some(slot) = self.slots.pop() {
            drop(slot);
        }
    }
}

/// Write-once cell for the scope's first recorded error.
///
/// Whichever source fails first (cancellation delivery or the inner
/// computation) wins the single write; later writes are ignored. Every
/// cleanup hook reads the same stored error by reference.
#[derive(Debug)]
pub(crate) struct ErrorCell<E> {
    slot: OnceLock<E>,
}

impl<E> ErrorCell<E> {
    pub(crate) fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Records `error` unless an earlier error already won.
    ///
    /// Returns `true` if this write was the first.
    pub(crate) fn set_first(&self, error: E) -> bool {
        self.slot.set(error).is_ok()
    }

    /// The first recorded error, if any.
    pub(crate) fn get(&self) -> Option<&E> {
        self.slot.get()
    }
}
