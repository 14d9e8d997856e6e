//! Environment abstraction for deterministic testing.
//!
//! Signature validity depends on "now", so the pipeline never reads the
//! system clock directly:
//!
//! - Deterministic tests: the harness provides a settable clock, so signature
//!   expiry and "created in the future" checks are reproducible.
//!
//! - Production: [`SystemEnv`] uses the system clock.
//!
//! Consuming a message needs no randomness; producing test messages does, and
//! that lives with the harness environment.
//!
//! # Invariants
//!
//! - Isolation: Implementations must not share global state

use std::time::SystemTime;

/// Abstract environment providing the current time.
pub trait Environment: Send + Sync {
    /// Returns the current wall-clock time.
    fn now(&self) -> SystemTime;
}

/// Production environment using the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}
