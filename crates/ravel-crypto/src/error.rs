//! Cryptographic error types.

use ravel_proto::Unsupported;
use thiserror::Error;

/// Errors from primitive cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Algorithm has no implementation in this backend.
    #[error("unsupported {0}")]
    Unsupported(Unsupported),

    /// Key length does not fit the algorithm.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Length required by the algorithm.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// Nonce length does not fit the AEAD mode.
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Length required by the mode.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// AEAD tag or key-wrap integrity check failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Key material is malformed or weak.
    #[error("invalid key material: {reason}")]
    InvalidKeyMaterial {
        /// Description of the defect.
        reason: &'static str,
    },

    /// Key derivation parameters rejected.
    #[error("invalid key derivation parameters: {reason}")]
    InvalidParameters {
        /// Description of the rejected parameter.
        reason: String,
    },

    /// Signature does not verify.
    #[error("bad signature")]
    BadSignature,
}

impl CryptoError {
    /// Returns true if the failure is a missing capability rather than bad
    /// input.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}
