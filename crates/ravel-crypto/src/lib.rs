//! Primitive cryptography for OpenPGP message consumption.
//!
//! The message consumer never touches a cipher or hash directly. It asks a
//! [`CryptoBackend`] for hash contexts, CFB and AEAD decryption, key
//! derivation, public-key session key decryption and signature verification.
//! [`RustCrypto`] is the default backend built on the RustCrypto and dalek
//! crates; tests and embedders may substitute their own.
//!
//! # Design
//!
//! - **Injected, not global**: Every consumer receives a backend reference.
//!   There is no process-wide provider registry.
//! - **Caller-supplied randomness**: Functions that need fresh secrets (the
//!   encryption side used by test tooling) take them as arguments, keeping
//!   this crate deterministic.
//!
//! # Security Properties
//!
//! - Secret keys, passphrases, session keys and decrypted buffers are wrapped
//!   in [`zeroize::Zeroizing`] and wiped on drop
//! - `Debug` output of secret-bearing types is redacted
//! - Modification detection codes are compared in constant time

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod backend;
pub mod ed25519;
pub mod error;
pub mod hash;
pub mod keys;
pub mod s2k;
pub mod symmetric;
pub mod x25519;

pub use backend::{CryptoBackend, RustCrypto};
pub use error::CryptoError;
pub use hash::{Hasher, SignatureHasher, digest_eq};
pub use keys::{DecryptionKey, Passphrase, SessionKey, VerifyingKey};
pub use zeroize::Zeroizing;
