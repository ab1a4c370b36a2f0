//! Stable handles to arena-owned scope arguments.
//!
//! A [`Capture<T>`] is the handle the inner computation (and nested
//! scopes) use to reach an owned argument. The value itself lives in a
//! heap cell owned by the scope's storage, so the handle stays valid
//! across suspension points; the handle is a cheap clone.
//!
//! Access goes through short, non-suspending critical sections
//! ([`Capture::with`] / [`Capture::with_mut`]). Scope phases are strictly
//! sequential (construction, then inner execution, then cleanup), so
//! the lock is never contended in a correct program; it exists to keep the
//! handle `Send` without unsafe code.

use core::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Heap cell backing one owned argument.
///
/// The cell is vacated only while its own cleanup hook runs, which is the
/// one window during which no other code may touch the argument.
pub(crate) struct CaptureCell<T> {
    value: Mutex<Option<T>>,
}

impl<T> CaptureCell<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            value: Mutex::new(Some(value)),
        }
    }

    /// Removes the value for the duration of its cleanup hook.
    ///
    /// Panics if the cell is already vacant: that means a cleanup task ran
    /// twice, which the orchestrator rules out.
    pub(crate) fn take_for_cleanup(&self) -> T {
        self.value
            .lock()
            .take()
            .expect("capture cell vacated twice; cleanup must run exactly once")
    }

    /// Puts the value back after its cleanup hook finished, so the
    /// destructor fires at storage-release time, not before.
    pub(crate) fn restore(&self, value: T) {
        *self.value.lock() = Some(value);
    }

    /// Exclusive access for scope-internal callers holding only the cell.
    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.value.lock();
        let value = guard
            .as_mut()
            .expect("capture accessed while its cleanup hook is running");
        f(value)
    }
}

/// Handle to an owned argument stored in a scope's storage.
///
/// Cloning shares the same slot. All clones observe the same value; the
/// value's destructor runs when the scope's storage is released (after
/// cleanup), provided no clone has been stashed outside the scope.
pub struct Capture<T> {
    cell: Arc<CaptureCell<T>>,
}

impl<T> Capture<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            cell: Arc::new(CaptureCell::new(value)),
        }
    }

    pub(crate) fn cell(&self) -> &Arc<CaptureCell<T>> {
        &self.cell
    }

    /// Runs `f` with shared access to the value.
    ///
    /// # Panics
    ///
    /// Panics if called from inside this argument's own cleanup hook,
    /// the only window during which the slot is vacant.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.cell.value.lock();
        let value = guard
            .as_ref()
            .expect("capture accessed while its cleanup hook is running");
        f(value)
    }

    /// Runs `f` with exclusive access to the value.
    ///
    /// # Panics
    ///
    /// Panics if called from inside this argument's own cleanup hook.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.cell.value.lock();
        let value = guard
            .as_mut()
            .expect("capture accessed while its cleanup hook is running");
        f(value)
    }

    /// Replaces the stored value, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        self.with_mut(|slot| std::mem::replace(slot, value))
    }

    /// Returns a copy of the value.
    pub fn get(&self) -> T
    where
        T: Copy,
    {
        self.with(|v| *v)
    }
}

impl<T> Clone for Capture<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Capture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.value.try_lock() {
            Some(guard) => f.debug_tuple("Capture").field(&*guard).finish(),
            None => f.write_str("Capture(<locked>)"),
        }
    }
}
