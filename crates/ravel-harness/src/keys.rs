//! Deterministic test identities.
//!
//! A [`TestRecipient`] holds an X25519 encryption key, a [`TestSigner`] an
//! Ed25519 signing key. Both are derived from a seed so that tests and fuzz
//! targets can recreate them.

use ravel_crypto::{DecryptionKey, VerifyingKey, ed25519};
use ravel_proto::{Fingerprint, KeyFlags, KeyId, KeyIdentifier};

use crate::sim_env::SimEnv;

/// Key creation time of every test key.
pub const KEY_CREATED: u32 = SimEnv::START - 86_400;

/// A recipient able to decrypt messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecipient {
    secret: [u8; 32],
    public: [u8; 32],
    fingerprint: Fingerprint,
}

impl TestRecipient {
    /// Recipient whose secret is derived from `seed`.
    pub fn from_seed(seed: u8) -> Self {
        let mut secret = [seed; 32];
        secret[0] = 0x40;
        let key = DecryptionKey::x25519(secret, KEY_CREATED, KeyFlags::ENCRYPT);
        let mut public = [0u8; 32];
        public.copy_from_slice(key.public_bytes());
        Self { secret, public, fingerprint: key.fingerprint() }
    }

    /// Private key for a credential list.
    pub fn decryption_key(&self) -> DecryptionKey {
        DecryptionKey::x25519(self.secret, KEY_CREATED, KeyFlags::ENCRYPT)
    }

    /// Public point senders encrypt to.
    pub fn public(&self) -> &[u8; 32] {
        &self.public
    }

    /// Fingerprint of the key.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Key ID of the key.
    pub fn key_id(&self) -> KeyId {
        self.fingerprint.key_id()
    }
}

/// A signer whose signatures tests can verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSigner {
    seed: [u8; 32],
    key: VerifyingKey,
}

impl TestSigner {
    /// Signer whose key is derived from `seed`.
    pub fn from_seed(seed: u8) -> Self {
        let seed = [seed; 32];
        let key =
            VerifyingKey::ed25519(ed25519::public_key(&seed), KEY_CREATED, KeyFlags::SIGN_DATA);
        Self { seed, key }
    }

    /// Certificate for a certificate list.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.clone()
    }

    /// Fingerprint of the key.
    pub fn fingerprint(&self) -> Fingerprint {
        self.key.fingerprint()
    }

    /// Key ID of the key.
    pub fn key_id(&self) -> KeyId {
        self.key.key_id()
    }

    /// Identifier matching this signer.
    pub fn identifier(&self) -> KeyIdentifier {
        KeyIdentifier::Fingerprint(self.fingerprint())
    }

    /// Ed25519 signature over `digest`.
    pub fn sign(&self, digest: &[u8]) -> [u8; 64] {
        ed25519::sign(&self.seed, digest)
    }
}
