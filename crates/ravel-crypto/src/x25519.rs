//! X25519 session key encryption (RFC 9580 section 5.1.6).
//!
//! The key-encryption key is HKDF-SHA256 over `ephemeral || recipient ||
//! shared secret` with info `"OpenPGP X25519"`; the session key is wrapped
//! with AES-128 key wrap.

use aes_kw::KekAes128;
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::CryptoError;

const INFO: &[u8] = b"OpenPGP X25519";

fn key_encryption_key(
    ephemeral: &[u8; 32],
    recipient: &[u8; 32],
    shared: &[u8; 32],
) -> Result<KekAes128, CryptoError> {
    let mut ikm = Zeroizing::new([0u8; 96]);
    ikm[..32].copy_from_slice(ephemeral);
    ikm[32..64].copy_from_slice(recipient);
    ikm[64..].copy_from_slice(shared);

    let mut kek = Zeroizing::new([0u8; 16]);
    Hkdf::<Sha256>::new(None, ikm.as_slice())
        .expand(INFO, kek.as_mut_slice())
        .map_err(|_| CryptoError::InvalidKeyMaterial { reason: "HKDF output length" })?;
    Ok(KekAes128::from(*kek))
}

/// Recovers a wrapped session key with the recipient's secret scalar.
pub fn unwrap_session_key(
    secret: &[u8; 32],
    ephemeral: &[u8; 32],
    wrapped_key: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let secret = StaticSecret::from(*secret);
    let recipient = PublicKey::from(&secret);
    let shared = secret.diffie_hellman(&PublicKey::from(*ephemeral));
    if !shared.was_contributory() {
        return Err(CryptoError::InvalidKeyMaterial { reason: "low order ephemeral point" });
    }

    let kek = key_encryption_key(ephemeral, recipient.as_bytes(), shared.as_bytes())?;
    kek.unwrap_vec(wrapped_key).map(Zeroizing::new).map_err(|_| CryptoError::AuthenticationFailed)
}

/// Wraps `session_key` to `recipient`, using `ephemeral_secret` as the
/// sender's one-time scalar. Returns the ephemeral public point and the
/// wrapped key.
pub fn wrap_session_key(
    recipient: &[u8; 32],
    ephemeral_secret: [u8; 32],
    session_key: &[u8],
) -> Result<([u8; 32], Vec<u8>), CryptoError> {
    let ephemeral_secret = StaticSecret::from(ephemeral_secret);
    let ephemeral = PublicKey::from(&ephemeral_secret).to_bytes();
    let shared = ephemeral_secret.diffie_hellman(&PublicKey::from(*recipient));
    if !shared.was_contributory() {
        return Err(CryptoError::InvalidKeyMaterial { reason: "low order recipient point" });
    }

    let kek = key_encryption_key(&ephemeral, recipient, shared.as_bytes())?;
    let wrapped = kek
        .wrap_vec(session_key)
        .map_err(|_| CryptoError::InvalidKeyLength { expected: 16, actual: session_key.len() })?;
    Ok((ephemeral, wrapped))
}
