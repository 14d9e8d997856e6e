//! Grammar-validating OpenPGP message consumption.
//!
//! Takes an OpenPGP message, checks that its packet sequence is a
//! well-formed message, opens every encrypted and compressed layer, verifies
//! one-pass and prefixed signatures over the literal data and reports what
//! it found as [`MessageMetadata`].
//!
//! ```text
//! packets ──► Pda per layer ──► SessionKeyResolver ──► decrypt / decompress
//!                                                          │
//!              MessageMetadata ◄── SignatureCorrelation ◄──┘ literal data
//! ```
//!
//! # Design
//!
//! - **Grammar first**: Every packet is accepted by its layer's pushdown
//!   automaton before it is acted on. See [`syntax`].
//! - **Injected capabilities**: Crypto, credentials, certificates, clock and
//!   configuration arrive through [`ConsumerOptions`]. Nothing is global.
//! - **Signatures are results, not errors**: A bad signature is recorded in
//!   the metadata; only structural, decryption and integrity failures stop
//!   the stream.
//!
//! # Security
//!
//! - Plaintext is released only after its layer authenticated
//! - Unauthenticated encryption (`SymmetricallyEncryptedData`) is refused
//! - Nesting depth, packet size and decompressed size are bounded
//! - Secrets and decrypted layer buffers are zeroized on drop; the literal
//!   data handed to the caller is not

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod credentials;
pub mod env;
pub mod error;
pub mod layer;
pub mod metadata;
pub mod resolver;
pub mod signatures;
pub mod stream;
pub mod syntax;

use std::io::Read;

pub use config::{DecryptionConfig, Policy};
pub use credentials::{CertificateProvider, Certificates, CredentialProvider, Credentials};
pub use env::{Environment, SystemEnv};
pub use error::{
    AttemptFailure, Error, ErrorCategory, KeyAttempt, KeyResolutionError, MalformedMessage,
};
pub use metadata::{
    CompressionLayer, EncryptionLayer, IntegrityProtection, Layer, LayerNode, LayerPosition,
    LiteralDataInfo, MessageMetadata,
};
pub use resolver::{KeySource, ResolvedSessionKey, SessionKeyResolver};
pub use signatures::{SignatureFailure, SignatureKind, SignatureVerification};
pub use stream::{ConsumerOptions, DecryptionStream};

/// Decrypts and verifies a complete message held in memory.
///
/// Returns the literal data and the metadata. Signature failures are
/// reported in the metadata, not as an error.
pub fn decrypt_and_verify(
    message: &[u8],
    options: ConsumerOptions<'_>,
) -> Result<(Vec<u8>, MessageMetadata), Error> {
    let mut stream = DecryptionStream::open(message, options)?;
    let mut plaintext = Vec::new();
    stream.read_to_end(&mut plaintext).map_err(Error::from_io)?;
    let metadata = stream.finish()?;
    Ok((plaintext, metadata))
}
