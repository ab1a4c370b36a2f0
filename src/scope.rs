//! Scope construction and the outer scope state machine.
//!
//! A scope is built in three steps, all synchronous and non-suspending:
//!
//! 1. **Bind** arguments with [`ScopeBuilder`]. Each bind classifies the
//!    argument (kind, safety, storage) and hands back the handle the
//!    inner computation will capture. Cleanup tasks are materialized here,
//!    before the inner computation can ever run.
//! 2. **Build** with an [`InnerTask`]. Storage placement is resolved, the
//!    arena is allocated only if some argument needs it, and the
//!    aggregate safety is computed.
//! 3. **Release** one of the two task flavors through [`Built`], the
//!    safety gate. The gate is checked once, eagerly, at construction;
//!    a refusal is a descriptive [`BuildError`], never a deferred fault.
//!
//! The released task then runs the phase machine:
//!
//! ```text
//! Created -> (PropagatingCancellation) -> AwaitingInner -> RunningCleanup -> Completed
//! ```
//!
//! Cleanup always runs, however the inner computation concluded, and all
//! owned storage is released only after the last cleanup task finishes.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::arena::{Arena, ErrorCell};
use crate::binding::{resolve_storage, BindingDescriptor, Marked};
use crate::cancel::CancelToken;
use crate::capability::{CancelReceptive, Cleanup};
use crate::capture::Capture;
use crate::cleanup::{make_cleanup_task, CleanupQueue, CleanupTask};
use crate::config::ScopeConfig;
use crate::error::BuildError;
use crate::outcome::{IntoOutcome, Outcome};
use crate::safety::{join, Safety};
use crate::task::{NowTask, ScopeTask};

type InnerFuture<T, E> = Pin<Box<dyn Future<Output = Outcome<T, E>> + Send + 'static>>;
type CancelDelivery<E> = Box<dyn FnOnce(&CancelToken) -> Result<(), E> + Send + 'static>;

/// The inner computation of a scope, with its declared safety level.
///
/// [`InnerTask::new`] declares [`Safety::ScopeInternal`]: the computation
/// was written for this scope and captures only handles the scope handed
/// out. [`InnerTask::untrusted`] declares [`Safety::Unsafe`] for arbitrary
/// foreign futures; such a scope can only release the immovable flavor.
pub struct InnerTask<T, E> {
    fut: InnerFuture<T, E>,
    declared: Safety,
}

impl<T, E> InnerTask<T, E> {
    /// Wraps a future written for this scope.
    ///
    /// The output may be an [`Outcome`] or a `Result`; both convert.
    pub fn new<F, O>(fut: F) -> Self
    where
        F: Future<Output = O> + Send + 'static,
        O: IntoOutcome<T, E>,
    {
        Self {
            fut: Box::pin(async move { fut.await.into_outcome() }),
            declared: Safety::ScopeInternal,
        }
    }

    /// Wraps a foreign future whose captures this scope cannot vouch for.
    pub fn untrusted<F, O>(fut: F) -> Self
    where
        F: Future<Output = O> + Send + 'static,
        O: IntoOutcome<T, E>,
    {
        Self {
            declared: Safety::Unsafe,
            ..Self::new(fut)
        }
    }

    /// Wraps an already-released scope task, inheriting its capability tag.
    pub fn from_scope(task: ScopeTask<T, E>) -> Self
    where
        T: Send + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let declared = task.safety();
        Self {
            fut: Box::pin(task),
            declared,
        }
    }

    /// The declared safety level of this computation.
    #[must_use]
    pub fn declared_safety(&self) -> Safety {
        self.declared
    }
}

/// Handle a scope hands to its own inner computation.
///
/// Lets recursive or self-scheduling computations observe the ambient
/// cancellation token and the scope's first recorded error. Stable by
/// construction (shared ownership), so it is classified heap-stable.
pub struct ScopeRef<E> {
    token: CancelToken,
    errors: Arc<ErrorCell<E>>,
}

impl<E> ScopeRef<E> {
    /// The ambient cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// True once the ambient token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Read-only view of the scope's first recorded error.
    #[must_use]
    pub fn first_error(&self) -> Option<&E> {
        self.errors.get()
    }
}

impl<E> Clone for ScopeRef<E> {
    fn clone(&self) -> Self {
        Self {
            token: self.token.clone(),
            errors: Arc::clone(&self.errors),
        }
    }
}

/// One cell-backed argument waiting for storage placement.
struct SlotRegistration {
    descriptor: usize,
    entry: Box<dyn crate::arena::ArenaEntry>,
}

/// Builder for a scope: binds arguments, then builds the task.
///
/// Binding order is declaration order, left to right; cleanup runs in the
/// exact reverse, and owned-argument destruction follows cleanup order.
pub struct ScopeBuilder<E> {
    config: ScopeConfig,
    descriptors: Vec<BindingDescriptor>,
    promotable: Vec<usize>,
    slots: Vec<SlotRegistration>,
    cleanups: CleanupQueue,
    deliveries: Vec<CancelDelivery<E>>,
    errors: Arc<ErrorCell<E>>,
    token: CancelToken,
    token_configured: bool,
}

impl<E> ScopeBuilder<E>
where
    E: Send + Sync + 'static,
{
    /// Creates a guarded builder: `Unsafe` arguments are rejected and both
    /// task flavors are available, subject to the gate.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ScopeConfig::default())
    }

    /// Creates an unguarded builder: `Unsafe` arguments are accepted, the
    /// aggregate is pinned to `Unsafe`, and only the immovable flavor can
    /// be released.
    #[must_use]
    pub fn unguarded() -> Self {
        Self::with_config(ScopeConfig::default().allow_unsafe(true))
    }

    /// Creates a builder with an explicit configuration.
    #[must_use]
    pub fn with_config(config: ScopeConfig) -> Self {
        Self {
            config,
            descriptors: Vec::new(),
            promotable: Vec::new(),
            slots: Vec::new(),
            cleanups: CleanupQueue::new(),
            deliveries: Vec::new(),
            errors: Arc::new(ErrorCell::new()),
            token: CancelToken::new(),
            token_configured: false,
        }
    }

    /// Supplies the ambient cancellation token to relay to receptive
    /// arguments before the inner computation starts.
    ///
    /// Configure the token before calling [`Self::self_ref`], which
    /// snapshots it.
    pub fn cancel_token(&mut self, token: CancelToken) -> &mut Self {
        self.token = token;
        self.token_configured = true;
        self
    }

    /// Binds a plain pass-through value. Recorded at [`Safety::Value`]
    /// and moved straight into the inner computation.
    pub fn value<T>(&mut self, value: T) -> T {
        let index = self.descriptors.len();
        self.descriptors
            .push(BindingDescriptor::owned_value(index, Safety::Value));
        value
    }

    /// Binds a nested scope task as a plain argument.
    ///
    /// A nested task looks like a value but may transitively carry
    /// references, so it is capped at [`Safety::MaybeValue`].
    pub fn nested<U, F>(&mut self, task: ScopeTask<U, F>) -> ScopeTask<U, F> {
        let index = self.descriptors.len();
        let safety = task.safety().min(Safety::MaybeValue);
        self.descriptors
            .push(BindingDescriptor::owned_value(index, safety));
        task
    }

    /// Starts binding an owned, cell-backed argument.
    ///
    /// Chain [`Bind::cleanup`] and/or [`Bind::on_cancel`] to register
    /// capabilities, then call [`Bind::finish`] for the handle.
    pub fn bind<T>(&mut self, value: T) -> Bind<'_, T, E>
    where
        T: Send + 'static,
    {
        let index = self.descriptors.len();
        Bind {
            capture: Capture::new(value),
            index,
            builder: self,
            cleanup: None,
            delivery: None,
        }
    }

    /// Binds an owned argument with no capabilities; shorthand for
    /// `bind(value).finish()`.
    pub fn owned<T>(&mut self, value: T) -> Capture<T>
    where
        T: Send + 'static,
    {
        self.bind(value).finish()
    }

    /// Binds a value carrying an explicitly vouched-for safety level.
    ///
    /// # Errors
    ///
    /// A guarded builder rejects [`Safety::Unsafe`] markings with
    /// [`BuildError::UnsafeArgumentRejected`].
    pub fn marked<T>(&mut self, marked: Marked<T>) -> Result<Marked<T>, BuildError> {
        let index = self.descriptors.len();
        if marked.safety() == Safety::Unsafe && !self.config.allow_unsafe {
            return Err(BuildError::UnsafeArgumentRejected {
                index,
                safety: marked.safety(),
            });
        }
        self.descriptors
            .push(BindingDescriptor::by_ref(index, marked.safety()));
        Ok(marked)
    }

    /// Re-binds a capture owned by an enclosing scope.
    ///
    /// The referent stays valid until the enclosing scope's cleanup
    /// completes, so the binding is classified [`Safety::CleanupSafeRef`].
    pub fn capture_ref<T>(&mut self, capture: &Capture<T>) -> Capture<T> {
        let index = self.descriptors.len();
        self.descriptors
            .push(BindingDescriptor::by_ref(index, Safety::CleanupSafeRef));
        capture.clone()
    }

    /// Binds a handle to this scope itself.
    pub fn self_ref(&mut self) -> ScopeRef<E> {
        let index = self.descriptors.len();
        self.descriptors.push(BindingDescriptor::self_ref(index));
        ScopeRef {
            token: self.token.clone(),
            errors: Arc::clone(&self.errors),
        }
    }

    /// Finishes construction: resolves storage, allocates the arena if
    /// needed, computes the aggregate safety, and wraps everything in the
    /// safety gate. Nothing is polled here.
    pub fn build<T>(self, inner: InnerTask<T, E>) -> Built<T, E> {
        let Self {
            config,
            mut descriptors,
            promotable,
            slots,
            cleanups,
            deliveries,
            errors,
            token,
            token_configured,
        } = self;

        let demand = resolve_storage(&mut descriptors, &promotable, config.force_arena);
        let arena = if demand && !slots.is_empty() {
            let mut arena = Arena::new();
            for slot in slots {
                debug_assert!(
                    descriptors[slot.descriptor].storage
                        == crate::binding::StorageClass::HeapStable
                );
                arena.push(slot.entry);
            }
            Some(arena)
        } else {
            None
        };

        let aggregate = if config.allow_unsafe {
            // Opting out of the gate pins the aggregate to the bottom of
            // the lattice; only the immovable flavor remains releasable.
            Safety::Unsafe
        } else {
            join(descriptors.iter().map(|d| d.safety))
        };
        let inner_declared = inner.declared;

        let propagate = config.propagate_cancel && token_configured;
        tracing::debug!(
            arguments = descriptors.len(),
            aggregate = %aggregate,
            inner = %inner_declared,
            arena = arena.as_ref().map_or(0, Arena::len),
            cleanups = cleanups.len(),
            propagate,
            "scope built"
        );

        let had_arena = arena.is_some();
        Built {
            fut: ScopeFuture {
                state: ScopeState::Created {
                    inner: inner.fut,
                    cleanups,
                },
                deliveries,
                token: propagate.then_some(token),
                errors,
                arena,
                had_arena,
            },
            aggregate,
            inner_declared,
            descriptors,
        }
    }
}

impl<E> Default for ScopeBuilder<E>
where
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// In-progress binding of one owned argument.
///
/// Dropping a `Bind` without calling [`Bind::finish`] abandons the
/// binding; the value is dropped and nothing is recorded.
pub struct Bind<'b, T, E> {
    builder: &'b mut ScopeBuilder<E>,
    capture: Capture<T>,
    index: usize,
    cleanup: Option<CleanupTask>,
    delivery: Option<CancelDelivery<E>>,
}

impl<T, E> Bind<'_, T, E>
where
    T: Send + 'static,
    E: Send + Sync + 'static,
{
    /// Registers the argument's async cleanup hook.
    ///
    /// The cleanup task is materialized here, before the inner
    /// computation can ever run, so a later allocation failure cannot
    /// leave this argument un-cleaned.
    #[must_use]
    pub fn cleanup(mut self) -> Self
    where
        T: Cleanup<E>,
    {
        let task = make_cleanup_task(
            self.index,
            Arc::clone(self.capture.cell()),
            Arc::clone(&self.builder.errors),
        );
        self.cleanup = Some(task);
        self
    }

    /// Registers the argument as a receiver of the ambient cancellation
    /// token.
    #[must_use]
    pub fn on_cancel(mut self) -> Self
    where
        T: CancelReceptive<E>,
    {
        let cell = Arc::clone(self.capture.cell());
        self.delivery = Some(Box::new(move |token: &CancelToken| {
            cell.with_mut(|value| value.receive_cancellation(token))
        }));
        self
    }

    /// Completes the binding and returns the argument handle.
    pub fn finish(self) -> Capture<T> {
        let Self {
            builder,
            capture,
            index,
            cleanup,
            delivery,
        } = self;
        debug_assert_eq!(index, builder.descriptors.len());

        let descriptor = if cleanup.is_some() {
            BindingDescriptor::owned_with_cleanup(index)
        } else {
            builder.promotable.push(index);
            BindingDescriptor::owned_value(index, Safety::MaybeValue)
        };
        builder.descriptors.push(descriptor);
        builder.slots.push(SlotRegistration {
            descriptor: index,
            entry: Box::new(Arc::clone(capture.cell())),
        });
        if let Some(task) = cleanup {
            builder.cleanups.push(task);
        }
        if let Some(delivery) = delivery {
            builder.deliveries.push(delivery);
        }
        capture
    }
}

/// The safety gate: a fully built scope, not yet released as a task.
///
/// Construction never polls the inner computation; a `Built` that is
/// dropped without being released runs no user code.
#[must_use = "a built scope runs nothing until released and awaited"]
pub struct Built<T, E> {
    fut: ScopeFuture<T, E>,
    aggregate: Safety,
    inner_declared: Safety,
    descriptors: Vec<BindingDescriptor>,
}

impl<T, E> Built<T, E> {
    /// True if [`Self::release`] would succeed: the aggregate argument
    /// safety and the inner computation's declared safety both meet their
    /// thresholds.
    #[must_use]
    pub fn is_safe(&self) -> bool {
        self.aggregate >= Safety::SHAREABLE_MIN && self.inner_declared >= Safety::INNER_MIN
    }

    /// The join of all bound arguments' safety levels.
    #[must_use]
    pub fn aggregate_safety(&self) -> Safety {
        self.aggregate
    }

    /// The inner computation's declared safety level.
    #[must_use]
    pub fn inner_safety(&self) -> Safety {
        self.inner_declared
    }

    /// The binding descriptors, in construction order.
    #[must_use]
    pub fn descriptors(&self) -> &[BindingDescriptor] {
        &self.descriptors
    }

    /// True if this scope allocated a storage arena.
    #[must_use]
    pub fn used_arena(&self) -> bool {
        self.fut.used_arena()
    }

    /// Releases the movable, storable task flavor.
    ///
    /// # Errors
    ///
    /// Fails descriptively, at construction time, when the aggregate
    /// argument safety is below [`Safety::SHAREABLE_MIN`] or the inner
    /// computation's declared safety is below [`Safety::INNER_MIN`].
    pub fn release(self) -> Result<ScopeTask<T, E>, BuildError> {
        if self.aggregate < Safety::SHAREABLE_MIN {
            return Err(BuildError::BelowShareableThreshold {
                aggregate: self.aggregate,
                required: Safety::SHAREABLE_MIN,
            });
        }
        if self.inner_declared < Safety::INNER_MIN {
            return Err(BuildError::UntrustedInner {
                declared: self.inner_declared,
                required: Safety::INNER_MIN,
            });
        }
        Ok(ScopeTask::new(self.fut, self.aggregate))
    }

    /// Releases the immovable flavor. Always succeeds, whatever the
    /// aggregate safety.
    pub fn release_now(self) -> NowTask<T, E> {
        NowTask::new(self.fut)
    }
}

/// Phase of the outer scope state machine.
enum ScopeState<T, E> {
    /// Built, not yet polled. Cancellation delivery happens on the first
    /// poll, before the inner computation is touched.
    Created {
        inner: InnerFuture<T, E>,
        cleanups: CleanupQueue,
    },
    /// Driving the inner computation.
    AwaitingInner {
        inner: InnerFuture<T, E>,
        cleanups: CleanupQueue,
    },
    /// Draining cleanup tasks, newest argument first. `outcome` is `None`
    /// when cancellation delivery failed and the inner computation was
    /// never invoked.
    RunningCleanup {
        outcome: Option<Outcome<T, E>>,
        cleanups: CleanupQueue,
    },
    /// Terminal.
    Completed,
}

/// The outer scope coroutine, shared by both task flavors.
pub(crate) struct ScopeFuture<T, E> {
    state: ScopeState<T, E>,
    deliveries: Vec<CancelDelivery<E>>,
    /// `Some` when cancellation propagation was requested.
    token: Option<CancelToken>,
    errors: Arc<ErrorCell<E>>,
    arena: Option<Arena>,
    /// Whether an arena was allocated at build time; survives its release.
    had_arena: bool,
}

impl<T, E> ScopeFuture<T, E> {
    pub(crate) fn used_arena(&self) -> bool {
        self.had_arena
    }
}

impl<T, E: Clone> ScopeFuture<T, E> {
    pub(crate) fn poll_scope(&mut self, cx: &mut Context<'_>) -> Poll<Outcome<T, E>> {
        loop {
            match mem::replace(&mut self.state, ScopeState::Completed) {
                ScopeState::Created { inner, cleanups } => {
                    if let Some(token) = self.token.take() {
                        tracing::trace!(
                            receivers = self.deliveries.len(),
                            "propagating cancellation token"
                        );
                        for (index, deliver) in self.deliveries.drain(..).enumerate() {
                            if let Err(error) = deliver(&token) {
                                tracing::debug!(
                                    argument = index,
                                    "cancellation delivery failed; skipping inner computation"
                                );
                                self.errors.set_first(error);
                                break;
                            }
                        }
                    } else {
                        self.deliveries.clear();
                    }

                    if self.errors.get().is_some() {
                        // Inner is never invoked; drop it unpolled.
                        drop(inner);
                        self.state = ScopeState::RunningCleanup {
                            outcome: None,
                            cleanups,
                        };
                    } else {
                        self.state = ScopeState::AwaitingInner { inner, cleanups };
                    }
                }
                ScopeState::AwaitingInner {
                    mut inner,
                    cleanups,
                } => match inner.as_mut().poll(cx) {
                    Poll::Pending => {
                        self.state = ScopeState::AwaitingInner { inner, cleanups };
                        return Poll::Pending;
                    }
                    Poll::Ready(outcome) => {
                        if let Outcome::Error(error) = &outcome {
                            self.errors.set_first(error.clone());
                        }
                        tracing::trace!(
                            cleanups = cleanups.len(),
                            "inner computation finished; running cleanup"
                        );
                        // `inner` is dropped here: its captured handles are
                        // released before any cleanup hook runs.
                        self.state = ScopeState::RunningCleanup {
                            outcome: Some(outcome),
                            cleanups,
                        };
                    }
                },
                ScopeState::RunningCleanup {
                    outcome,
                    mut cleanups,
                } => match cleanups.poll_drain(cx) {
                    Poll::Pending => {
                        self.state = ScopeState::RunningCleanup { outcome, cleanups };
                        return Poll::Pending;
                    }
                    Poll::Ready(()) => {
                        // Every cleanup has completed; only now is owned
                        // storage released, in reverse construction order.
                        self.arena = None;
                        self.state = ScopeState::Completed;
                        return Poll::Ready(self.resolve(outcome));
                    }
                },
                ScopeState::Completed => panic!("scope task polled after completion"),
            }
        }
    }

    /// Final outcome resolution: value, then captured error, then
    /// cancellation. An unwritten outcome slot is a defect in the scope
    /// machinery itself, never user-recoverable.
    fn resolve(&self, outcome: Option<Outcome<T, E>>) -> Outcome<T, E> {
        match (outcome, self.errors.get()) {
            (Some(Outcome::Value(v)), _) => Outcome::Value(v),
            (Some(Outcome::Cancelled(r)), _) => Outcome::Cancelled(r),
            (Some(Outcome::Error(_)) | None, Some(error)) => Outcome::Error(error.clone()),
            (Some(Outcome::Error(error)), None) => Outcome::Error(error),
            (None, None) => {
                panic!("scope completed without a recorded outcome; this is a bug in the scope")
            }
        }
    }
}
