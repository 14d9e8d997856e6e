//! Reference model of the message grammar.
//!
//! The model is a direct recursive-descent reading of the RFC 9580 message
//! grammar. It serves as the oracle against which the pushdown automaton and
//! the full decryption stream are checked.
//!
//! # Design Principles
//!
//! - Simplicity: The recognizer should be obviously correct
//! - Structure, not bytes: A [`Token`] is one packet, containers hold their
//!   contents as nested tokens
//! - Deterministic: The same tokens always render to the same packets

mod grammar;
mod render;
pub mod token;

pub use grammar::{is_layer, is_message};
pub use render::{SESSION_KEY, render, session_key};
pub use token::Token;
