//! Taskscope: structured-concurrency resource scopes for async Rust.
//!
//! # Overview
//!
//! A *scope* is a single asynchronous unit of work that owns its
//! arguments. The caller binds arguments with varying aliasing/ownership
//! guarantees, supplies an inner computation with stable access to them,
//! and gets back a task that, on success, failure, or cancellation,
//! runs each argument's cleanup hook in deterministic reverse order
//! before any argument is destroyed. Every scope is classified by an
//! aggregate safety level, so a caller cannot accidentally release a
//! movable task whose references may outlive their referents.
//!
//! # Core Guarantees
//!
//! - **Reverse-order cleanup**: hooks run strictly sequentially in the
//!   exact reverse of argument construction order
//! - **Cleanup before destruction**: no owned argument's destructor fires
//!   until every cleanup hook has completed
//! - **One first error**: a single write-once error slot, visible to every
//!   cleanup hook; whichever source fails first wins
//! - **Eager safety gating**: safety violations surface at construction,
//!   never mid-execution
//! - **Zero-overhead path**: scopes with no heap-stable arguments allocate
//!   no arena and behave observably identically
//!
//! # Module Structure
//!
//! - [`safety`]: the aliasing-safety lattice and its join
//! - [`binding`]: per-argument classification (kind, safety, storage)
//! - [`capability`]: opt-in `Cleanup` / `CancelReceptive` traits
//! - [`capture`]: stable handles to scope-owned arguments
//! - [`outcome`]: tri-state result of a unit of work
//! - [`cancel`]: cancellation reasons and the ambient token
//! - [`scope`]: the builder, the safety gate, and the phase machine
//! - [`task`]: the movable and immovable task flavors
//! - [`awaited`]: `Result`-style adapter over outcome futures
//! - [`config`]: construction-time configuration
//! - [`error`]: construction and scope error types
//! - [`test_utils`]: logging and future-driving helpers for tests
//!
//! # Example
//!
//! ```
//! use taskscope::{InnerTask, Outcome, ScopeBuilder};
//! use taskscope::test_utils::block_on;
//!
//! let mut scope: ScopeBuilder<String> = ScopeBuilder::new();
//! let counter = scope.owned(0u32);
//! let task = scope
//!     .build(InnerTask::new(async move {
//!         counter.with_mut(|n| *n += 42);
//!         Outcome::Value(counter.get())
//!     }))
//!     .release()
//!     .expect("all bindings are value-like");
//! assert_eq!(block_on(task), Outcome::Value(42));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_panics_doc)]

pub mod awaited;
pub mod binding;
pub mod cancel;
pub mod capability;
pub mod capture;
pub mod config;
pub mod error;
pub mod outcome;
pub mod safety;
pub mod scope;
pub mod task;
pub mod test_utils;

mod arena;
mod cleanup;

// Re-exports for convenient access to core types
pub use awaited::{awaited, Awaited};
pub use binding::{BindingDescriptor, BindingKind, Marked, StorageClass};
pub use cancel::{CancelKind, CancelReason, CancelToken};
pub use capability::{CancelReceptive, Cleanup};
pub use capture::Capture;
pub use config::ScopeConfig;
pub use error::{BuildError, ScopeError};
pub use outcome::{IntoOutcome, Outcome};
pub use safety::{join, Safety};
pub use scope::{Bind, Built, InnerTask, ScopeBuilder, ScopeRef};
pub use task::{NowTask, ScopeTask};
