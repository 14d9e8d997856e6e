//! Ed25519 signatures over OpenPGP digests.
//!
//! OpenPGP signs the hash digest, not the message, so both functions take
//! the finished digest.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

use crate::error::CryptoError;

/// Verifies `signature` over `digest` with strict (non-malleable) checks.
pub fn verify(public: &[u8; 32], digest: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
    let key = VerifyingKey::from_bytes(public)
        .map_err(|_| CryptoError::InvalidKeyMaterial { reason: "invalid Ed25519 point" })?;
    key.verify_strict(digest, &Signature::from_bytes(signature))
        .map_err(|_| CryptoError::BadSignature)
}

/// Signs `digest` with the secret seed.
pub fn sign(seed: &[u8; 32], digest: &[u8]) -> [u8; 64] {
    SigningKey::from_bytes(seed).sign(digest).to_bytes()
}

/// Public point for a secret seed.
pub fn public_key(seed: &[u8; 32]) -> [u8; 32] {
    SigningKey::from_bytes(seed).verifying_key().to_bytes()
}
