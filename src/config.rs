//! Configuration for scope construction.
//!
//! The configuration controls construction-time behavior only; nothing
//! here changes what the caller observes from a correct scope:
//! - `force_arena` defeats the no-arena optimization (the two paths must
//!   be observably identical, and tests hold us to that);
//! - `propagate_cancel` is the master switch for cancellation-token
//!   delivery;
//! - `allow_unsafe` opts out of the safety gate, which limits the scope
//!   to the immovable task flavor.

use serde::{Deserialize, Serialize};

/// Construction-time configuration for a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Allocate the storage arena even when no argument requires it.
    pub force_arena: bool,
    /// Deliver the ambient cancellation token to receptive arguments.
    pub propagate_cancel: bool,
    /// Accept arguments marked `Unsafe`. Scopes built this way can only
    /// release an immovable task.
    pub allow_unsafe: bool,
}

impl ScopeConfig {
    /// Creates the default configuration: optimized storage, cancellation
    /// propagation on, safety gate on.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            force_arena: false,
            propagate_cancel: true,
            allow_unsafe: false,
        }
    }

    /// Sets whether the arena is allocated unconditionally.
    #[must_use]
    pub const fn force_arena(mut self, value: bool) -> Self {
        self.force_arena = value;
        self
    }

    /// Sets whether the ambient cancellation token is delivered.
    #[must_use]
    pub const fn propagate_cancel(mut self, value: bool) -> Self {
        self.propagate_cancel = value;
        self
    }

    /// Sets whether `Unsafe`-marked arguments are accepted.
    #[must_use]
    pub const fn allow_unsafe(mut self, value: bool) -> Self {
        self.allow_unsafe = value;
        self
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_the_gate_on() {
        let config = ScopeConfig::default();
        assert!(!config.force_arena);
        assert!(config.propagate_cancel);
        assert!(!config.allow_unsafe);
    }

    #[test]
    fn builder_methods_compose() {
        let config = ScopeConfig::new().force_arena(true).allow_unsafe(true);
        assert!(config.force_arena);
        assert!(config.allow_unsafe);
        assert!(config.propagate_cancel);
    }
}
