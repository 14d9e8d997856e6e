//! Deterministic test harness for ravel.
//!
//! Seeded implementations of the [`Environment`](ravel_core::Environment)
//! trait, fixed test identities and a [`MessageBuilder`] that produces
//! signed, compressed and encrypted messages reproducibly.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference recognizer for the message
//! grammar. Token trees are fed to both the model and the real consumer, and
//! their verdicts are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod keys;
pub mod model;
pub mod sim_env;

pub use builder::{BuildError, Encryption, MessageBuilder, Scheme, SignatureParams};
pub use keys::{KEY_CREATED, TestRecipient, TestSigner};
pub use model::{Token, is_layer, is_message, render, session_key};
pub use sim_env::SimEnv;
