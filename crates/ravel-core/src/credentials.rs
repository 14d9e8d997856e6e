//! Credential and certificate lookup.
//!
//! The pipeline never owns key material. It borrows it through two
//! capability traits so that embedders can back them with a keyring, an
//! agent or an in-memory list. [`Credentials`] and [`Certificates`] are the
//! in-memory implementations.

use ravel_crypto::{DecryptionKey, Passphrase, SessionKey, VerifyingKey};
use ravel_proto::KeyIdentifier;

/// Secrets that may open an encrypted message.
///
/// Candidates are tried in the order returned.
pub trait CredentialProvider {
    /// Private keys matching `id`.
    fn private_keys_by_identifier(&self, id: &KeyIdentifier) -> Vec<&DecryptionKey>;

    /// Every private key, for recipients hidden behind a wildcard.
    fn all_private_keys(&self) -> Vec<&DecryptionKey>;

    /// Candidate passphrases.
    fn passphrases(&self) -> &[Passphrase];

    /// Session keys known in advance, tried before any key packet.
    fn session_keys(&self) -> &[SessionKey] {
        &[]
    }
}

/// Public keys that may have signed a message.
pub trait CertificateProvider {
    /// Signing key matching `id`.
    fn public_key_by_identifier(&self, id: &KeyIdentifier) -> Option<&VerifyingKey>;
}

/// In-memory credential list.
#[derive(Debug, Default)]
pub struct Credentials {
    keys: Vec<DecryptionKey>,
    passphrases: Vec<Passphrase>,
    session_keys: Vec<SessionKey>,
}

impl Credentials {
    /// Empty credential list.
    pub const fn new() -> Self {
        Self { keys: Vec::new(), passphrases: Vec::new(), session_keys: Vec::new() }
    }

    /// Adds a private key.
    #[must_use]
    pub fn with_key(mut self, key: DecryptionKey) -> Self {
        self.keys.push(key);
        self
    }

    /// Adds a candidate passphrase.
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<Passphrase>) -> Self {
        self.passphrases.push(passphrase.into());
        self
    }

    /// Adds a session key.
    #[must_use]
    pub fn with_session_key(mut self, session_key: SessionKey) -> Self {
        self.session_keys.push(session_key);
        self
    }
}

impl CredentialProvider for Credentials {
    fn private_keys_by_identifier(&self, id: &KeyIdentifier) -> Vec<&DecryptionKey> {
        self.keys.iter().filter(|key| id.matches_fingerprint(&key.fingerprint())).collect()
    }

    fn all_private_keys(&self) -> Vec<&DecryptionKey> {
        self.keys.iter().collect()
    }

    fn passphrases(&self) -> &[Passphrase] {
        &self.passphrases
    }

    fn session_keys(&self) -> &[SessionKey] {
        &self.session_keys
    }
}

/// In-memory certificate list.
#[derive(Debug, Default, Clone)]
pub struct Certificates {
    keys: Vec<VerifyingKey>,
}

impl Certificates {
    /// Empty certificate list.
    pub const fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Adds a signing key.
    #[must_use]
    pub fn with_key(mut self, key: VerifyingKey) -> Self {
        self.keys.push(key);
        self
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if no key was added.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl CertificateProvider for Certificates {
    fn public_key_by_identifier(&self, id: &KeyIdentifier) -> Option<&VerifyingKey> {
        self.keys.iter().find(|key| id.matches_fingerprint(&key.fingerprint()))
    }
}
