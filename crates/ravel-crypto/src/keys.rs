//! Key material handed to the crypto backend.
//!
//! # Security
//!
//! - **Debug Redaction**: Every type holding secret octets implements `Debug`
//!   by hand and prints lengths or identifiers only.
//! - **Zeroize on drop**: Secret octets live in [`Zeroizing`] buffers.

use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use ravel_proto::{Fingerprint, KeyFlags, KeyId, PublicKeyAlgorithm, SymmetricAlgorithm};
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

/// Computes a version 4 fingerprint for a key with native public material.
///
/// The fingerprint is SHA-1 over `0x99`, the two-octet body length and the
/// public key packet body `4 || created || algorithm || material`.
pub fn v4_fingerprint(created: u32, algorithm: PublicKeyAlgorithm, material: &[u8]) -> Fingerprint {
    let body_len = 6 + material.len();
    let mut hasher = Sha1::new();
    hasher.update([0x99]);
    hasher.update(u16::try_from(body_len).unwrap_or(u16::MAX).to_be_bytes());
    hasher.update([4]);
    hasher.update(created.to_be_bytes());
    hasher.update([u8::from(algorithm)]);
    hasher.update(material);
    Fingerprint::V4(hasher.finalize().into())
}

/// A passphrase.
#[derive(Clone)]
pub struct Passphrase(Zeroizing<Vec<u8>>);

impl Passphrase {
    /// Wraps passphrase octets.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    /// Passphrase octets.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Passphrase {
    fn from(passphrase: &str) -> Self {
        Self::new(passphrase.as_bytes())
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passphrase(<redacted {} bytes>)", self.0.len())
    }
}

/// A session key, optionally tagged with its cipher.
///
/// Version 6 key packets do not carry the cipher; the encrypted data packet
/// names it instead.
#[derive(Clone)]
pub struct SessionKey {
    algorithm: Option<SymmetricAlgorithm>,
    key: Zeroizing<Vec<u8>>,
}

impl SessionKey {
    /// Wraps key octets.
    pub fn new(algorithm: Option<SymmetricAlgorithm>, key: impl Into<Vec<u8>>) -> Self {
        Self { algorithm, key: Zeroizing::new(key.into()) }
    }

    /// Cipher, if known.
    pub fn algorithm(&self) -> Option<SymmetricAlgorithm> {
        self.algorithm
    }

    /// Key octets.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// Key length in octets.
    pub fn len(&self) -> usize {
        self.key.len()
    }

    /// True for an empty key, which never decrypts anything.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("algorithm", &self.algorithm)
            .field("key", &format!("<redacted {} bytes>", self.key.len()))
            .finish()
    }
}

/// Secret half of a decryption key.
pub enum SecretKeyMaterial {
    /// X25519 secret scalar and its public point.
    X25519 {
        /// Secret scalar.
        secret: Zeroizing<[u8; 32]>,
        /// Public point.
        public: [u8; 32],
    },
}

/// A private key able to decrypt session keys.
pub struct DecryptionKey {
    fingerprint: Fingerprint,
    flags: KeyFlags,
    material: SecretKeyMaterial,
}

impl DecryptionKey {
    /// Builds an X25519 decryption key from its secret scalar.
    pub fn x25519(secret: [u8; 32], created: u32, flags: KeyFlags) -> Self {
        let public =
            x25519_dalek::PublicKey::from(&x25519_dalek::StaticSecret::from(secret)).to_bytes();
        let fingerprint = v4_fingerprint(created, PublicKeyAlgorithm::X25519, &public);
        Self {
            fingerprint,
            flags,
            material: SecretKeyMaterial::X25519 { secret: Zeroizing::new(secret), public },
        }
    }

    /// Fingerprint of the key.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Key ID of the key.
    pub fn key_id(&self) -> KeyId {
        self.fingerprint.key_id()
    }

    /// Usage flags.
    pub fn flags(&self) -> KeyFlags {
        self.flags
    }

    /// Algorithm of the key.
    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        match self.material {
            SecretKeyMaterial::X25519 { .. } => PublicKeyAlgorithm::X25519,
        }
    }

    /// Secret material.
    pub fn material(&self) -> &SecretKeyMaterial {
        &self.material
    }

    /// Public point, which senders encrypt to.
    pub fn public_bytes(&self) -> &[u8] {
        match &self.material {
            SecretKeyMaterial::X25519 { public, .. } => public,
        }
    }
}

impl fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionKey")
            .field("fingerprint", &self.fingerprint)
            .field("algorithm", &self.algorithm())
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// Public half of a signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyMaterial {
    /// Ed25519 public point.
    Ed25519([u8; 32]),
}

/// A public key able to verify signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    fingerprint: Fingerprint,
    flags: KeyFlags,
    created: u32,
    material: PublicKeyMaterial,
}

impl VerifyingKey {
    /// Builds an Ed25519 verifying key.
    pub fn ed25519(public: [u8; 32], created: u32, flags: KeyFlags) -> Self {
        let fingerprint = v4_fingerprint(created, PublicKeyAlgorithm::Ed25519, &public);
        Self { fingerprint, flags, created, material: PublicKeyMaterial::Ed25519(public) }
    }

    /// Fingerprint of the key.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Key ID of the key.
    pub fn key_id(&self) -> KeyId {
        self.fingerprint.key_id()
    }

    /// Usage flags.
    pub fn flags(&self) -> KeyFlags {
        self.flags
    }

    /// Key creation time.
    pub fn creation_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(u64::from(self.created))
    }

    /// Algorithm of the key.
    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        match self.material {
            PublicKeyMaterial::Ed25519(_) => PublicKeyAlgorithm::Ed25519,
        }
    }

    /// Public material.
    pub fn material(&self) -> &PublicKeyMaterial {
        &self.material
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let passphrase = Passphrase::from("correct horse");
        assert_eq!(format!("{passphrase:?}"), "Passphrase(<redacted 13 bytes>)");

        let key = SessionKey::new(Some(SymmetricAlgorithm::Aes128), vec![0x42; 16]);
        let rendered = format!("{key:?}");
        assert!(rendered.contains("<redacted 16 bytes>"));
        assert!(!rendered.contains("66"));

        let decryption = DecryptionKey::x25519([7; 32], 0, KeyFlags::ENCRYPT);
        assert!(!format!("{decryption:?}").contains("secret"));
    }

    #[test]
    fn fingerprint_depends_on_creation_time() {
        let a = VerifyingKey::ed25519([1; 32], 1, KeyFlags::SIGN_DATA);
        let b = VerifyingKey::ed25519([1; 32], 2, KeyFlags::SIGN_DATA);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.key_id(), a.fingerprint().key_id());
    }

    #[test]
    fn x25519_public_point_is_derived() {
        let key = DecryptionKey::x25519([9; 32], 0, KeyFlags::ENCRYPT);
        assert_eq!(key.algorithm(), PublicKeyAlgorithm::X25519);
        assert_ne!(key.public_bytes(), &[9; 32]);
    }
}
