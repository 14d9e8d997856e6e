//! Session key recovery by trial.
//!
//! # Design
//!
//! Candidates are tried strictly in order and the first that decrypts and
//! authenticates the layer wins:
//!
//! 1. Session keys supplied by the caller
//! 2. Each key packet of the layer, in packet order, with each matching
//!    credential in provider order
//!
//! Every failed trial is recorded as a [`KeyAttempt`], so a caller can tell
//! "no key matched" apart from "a key matched but could not be used".
//!
//! # Security Properties
//!
//! - **Full trial**: A candidate is accepted only after the whole layer
//!   decrypted under it and its MDC or every AEAD tag verified. A wrong key
//!   that happens to pass the quick check is recorded as a failed attempt
//!   and the search goes on.
//! - **Quick check first**: Caller-supplied keys and version 4 passphrase
//!   packets are not authenticated, so they must pass [`quick_check`]
//!   before the layer is decrypted under them.
//! - **Version binding**: version 3/4 key packets only open version 1 data
//!   and version 6 key packets only open version 2 data.

use ravel_crypto::{CryptoBackend, CryptoError, DecryptionKey, Passphrase, SessionKey, Zeroizing};
use ravel_proto::{
    Fingerprint, IntegrityProtectedData, PassphraseEncryptedSessionKey,
    PublicKeyEncryptedSessionKey, SessionKeyMaterial, SymmetricAlgorithm, Unsupported,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    config::Policy,
    credentials::CredentialProvider,
    error::{AttemptFailure, Error, KeyAttempt, KeyResolutionError},
    layer::{
        Plaintext,
        decrypt::{decrypt, quick_check},
    },
};

/// Where a session key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeySource {
    /// Supplied by the caller.
    SessionKey {
        /// Position in [`CredentialProvider::session_keys`].
        index: usize,
    },
    /// Derived from a passphrase.
    Passphrase {
        /// Position in [`CredentialProvider::passphrases`].
        index: usize,
    },
    /// Decrypted with a private key.
    PublicKey {
        /// Fingerprint of the private key.
        fingerprint: Fingerprint,
    },
}

/// A session key packet of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptedSessionKey {
    /// Encrypted to a public key.
    PublicKey(PublicKeyEncryptedSessionKey),
    /// Encrypted with a passphrase.
    Passphrase(PassphraseEncryptedSessionKey),
}

impl EncryptedSessionKey {
    /// Packet version.
    pub fn version(&self) -> u8 {
        match self {
            Self::PublicKey(pkesk) => pkesk.version,
            Self::Passphrase(skesk) => skesk.version(),
        }
    }

    /// Whether this packet may open encrypted data of `data_version`.
    pub fn fits(&self, data_version: u8) -> bool {
        matches!((self.version(), data_version), (3 | 4, 1) | (6, 2))
    }
}

/// Outcome of a successful trial.
#[derive(Debug)]
pub struct ResolvedSessionKey {
    /// Data cipher.
    pub algorithm: SymmetricAlgorithm,
    /// Session key, tagged with its cipher.
    pub session_key: SessionKey,
    /// Credential that produced it.
    pub source: KeySource,
    /// Authenticated content of the layer.
    pub plaintext: Plaintext,
}

/// Recovers the session key of one encrypted layer.
pub struct SessionKeyResolver<'a> {
    backend: &'a dyn CryptoBackend,
    credentials: &'a dyn CredentialProvider,
    policy: &'a Policy,
}

/// A session key candidate before validation.
struct Candidate {
    algorithm: Option<SymmetricAlgorithm>,
    key: Zeroizing<Vec<u8>>,
    authenticated: bool,
}

impl<'a> SessionKeyResolver<'a> {
    /// Resolver over the given collaborators.
    pub fn new(
        backend: &'a dyn CryptoBackend,
        credentials: &'a dyn CredentialProvider,
        policy: &'a Policy,
    ) -> Self {
        Self { backend, credentials, policy }
    }

    /// Tries every candidate against `data` until one decrypts it.
    ///
    /// Fails with [`Error::UnsupportedAlgorithm`] when every attempt failed
    /// only because of an algorithm, with [`Error::IntegrityCheckFailed`]
    /// when a candidate got as far as the layer's authentication and failed
    /// there, and with [`Error::NoAcceptableDecryptionKey`] otherwise.
    pub fn resolve(
        &self,
        esks: &[EncryptedSessionKey],
        data: &IntegrityProtectedData,
    ) -> Result<ResolvedSessionKey, Error> {
        let mut attempts = Vec::new();

        for (index, supplied) in self.credentials.session_keys().iter().enumerate() {
            let source = KeySource::SessionKey { index };
            let candidate = Candidate {
                algorithm: supplied.algorithm(),
                key: Zeroizing::new(supplied.as_bytes().to_vec()),
                authenticated: false,
            };
            match self.accept(candidate, data, source) {
                Ok(resolved) => {
                    debug!(?source, "supplied session key accepted");
                    return Ok(resolved);
                },
                Err(failure) => {
                    let credential = Some(source);
                    attempts.push(KeyAttempt { esk_index: None, credential, failure });
                },
            }
        }

        for (esk_index, esk) in esks.iter().enumerate() {
            if !esk.fits(data.version()) {
                attempts.push(KeyAttempt {
                    esk_index: Some(esk_index),
                    credential: None,
                    failure: AttemptFailure::VersionMismatch {
                        esk: esk.version(),
                        data: data.version(),
                    },
                });
                continue;
            }

            let found = match esk {
                EncryptedSessionKey::PublicKey(pkesk) => {
                    self.try_private_keys(esk_index, pkesk, data, &mut attempts)
                },
                EncryptedSessionKey::Passphrase(skesk) => {
                    self.try_passphrases(esk_index, skesk, data, &mut attempts)
                },
            };
            if let Some(resolved) = found {
                debug!(source = ?resolved.source, esk_index, "session key resolved");
                return Ok(resolved);
            }
        }

        debug!(attempts = attempts.len(), "no session key candidate accepted");
        let unsupported: Vec<_> = attempts.iter().map(|a| a.failure.unsupported()).collect();
        if let Some(Some(first)) = unsupported.first()
            && unsupported.iter().all(Option::is_some)
        {
            return Err(Error::UnsupportedAlgorithm(*first));
        }
        let integrity = attempts.iter().find_map(|attempt| match attempt.failure {
            AttemptFailure::IntegrityCheckFailed { reason } => Some(reason),
            _ => None,
        });
        if let Some(reason) = integrity {
            return Err(Error::IntegrityCheckFailed { reason });
        }
        Err(Error::NoAcceptableDecryptionKey(KeyResolutionError { attempts }))
    }

    fn try_private_keys(
        &self,
        esk_index: usize,
        pkesk: &PublicKeyEncryptedSessionKey,
        data: &IntegrityProtectedData,
        attempts: &mut Vec<KeyAttempt>,
    ) -> Option<ResolvedSessionKey> {
        let keys: Vec<&DecryptionKey> = match &pkesk.recipient {
            Some(id) => self.credentials.private_keys_by_identifier(id),
            None => self
                .credentials
                .all_private_keys()
                .into_iter()
                .filter(|key| key.flags().can_encrypt() && key.algorithm() == pkesk.algorithm)
                .collect(),
        };
        if keys.is_empty() {
            attempts.push(KeyAttempt {
                esk_index: Some(esk_index),
                credential: None,
                failure: AttemptFailure::NoMatchingKey { recipient: pkesk.recipient },
            });
            return None;
        }

        for key in keys {
            let source = KeySource::PublicKey { fingerprint: key.fingerprint() };
            trace!(esk_index, fingerprint = %key.fingerprint(), "trying private key");
            let result = self
                .unlock_with_key(key, pkesk)
                .and_then(|candidate| self.accept(candidate, data, source));
            match result {
                Ok(resolved) => return Some(resolved),
                Err(failure) => {
                    attempts.push(KeyAttempt {
                        esk_index: Some(esk_index),
                        credential: Some(source),
                        failure,
                    });
                },
            }
        }
        None
    }

    fn unlock_with_key(
        &self,
        key: &DecryptionKey,
        pkesk: &PublicKeyEncryptedSessionKey,
    ) -> Result<Candidate, AttemptFailure> {
        if !self.policy.is_public_key_algorithm_acceptable(pkesk.algorithm) {
            return Err(AttemptFailure::Rejected(Unsupported::PublicKey(pkesk.algorithm)));
        }
        if key.algorithm() != pkesk.algorithm {
            return Err(AttemptFailure::Crypto(CryptoError::InvalidKeyMaterial {
                reason: "key algorithm differs from key packet",
            }));
        }

        let key_bytes = self
            .backend
            .decrypt_session_key(key, &pkesk.material)
            .map_err(AttemptFailure::Crypto)?;
        let algorithm = match &pkesk.material {
            SessionKeyMaterial::X25519 { symmetric_algorithm, .. } => *symmetric_algorithm,
            SessionKeyMaterial::Opaque(_) => None,
        };
        Ok(Candidate { algorithm, key: key_bytes, authenticated: true })
    }

    fn try_passphrases(
        &self,
        esk_index: usize,
        skesk: &PassphraseEncryptedSessionKey,
        data: &IntegrityProtectedData,
        attempts: &mut Vec<KeyAttempt>,
    ) -> Option<ResolvedSessionKey> {
        for (index, passphrase) in self.credentials.passphrases().iter().enumerate() {
            let source = KeySource::Passphrase { index };
            trace!(esk_index, passphrase = index, "trying passphrase");
            let result = self
                .unlock_with_passphrase(passphrase, skesk)
                .and_then(|candidate| self.accept(candidate, data, source));
            match result {
                Ok(resolved) => return Some(resolved),
                Err(failure) => {
                    attempts.push(KeyAttempt {
                        esk_index: Some(esk_index),
                        credential: Some(source),
                        failure,
                    });
                },
            }
        }
        None
    }

    fn derive(
        &self,
        algorithm: SymmetricAlgorithm,
        skesk: &PassphraseEncryptedSessionKey,
        passphrase: &Passphrase,
    ) -> Result<Zeroizing<Vec<u8>>, AttemptFailure> {
        if !self.policy.is_symmetric_algorithm_acceptable(algorithm) {
            return Err(AttemptFailure::Rejected(Unsupported::Symmetric(algorithm)));
        }
        let len = algorithm
            .key_size()
            .ok_or(AttemptFailure::Rejected(Unsupported::Symmetric(algorithm)))?;
        let mut kek = Zeroizing::new(vec![0u8; len]);
        self.backend
            .derive_key(skesk.s2k(), passphrase, &mut kek)
            .map_err(AttemptFailure::Crypto)?;
        Ok(kek)
    }

    fn unlock_with_passphrase(
        &self,
        passphrase: &Passphrase,
        skesk: &PassphraseEncryptedSessionKey,
    ) -> Result<Candidate, AttemptFailure> {
        match skesk {
            PassphraseEncryptedSessionKey::V4 { symmetric_algorithm, encrypted_key, .. } => {
                let kek = self.derive(*symmetric_algorithm, skesk, passphrase)?;
                let Some(encrypted_key) = encrypted_key else {
                    return Ok(Candidate {
                        algorithm: Some(*symmetric_algorithm),
                        key: kek,
                        authenticated: false,
                    });
                };

                let mut decrypted = Zeroizing::new(encrypted_key.to_vec());
                self.backend
                    .cfb_decrypt(*symmetric_algorithm, &kek, &mut decrypted)
                    .map_err(AttemptFailure::Crypto)?;
                let (&algorithm, key) =
                    decrypted.split_first().ok_or(AttemptFailure::InvalidSessionKey)?;
                Ok(Candidate {
                    algorithm: Some(SymmetricAlgorithm::from(algorithm)),
                    key: Zeroizing::new(key.to_vec()),
                    authenticated: false,
                })
            },
            PassphraseEncryptedSessionKey::V6 {
                symmetric_algorithm,
                aead_algorithm,
                iv,
                encrypted_key,
                ..
            } => {
                if !self.policy.is_aead_algorithm_acceptable(*aead_algorithm) {
                    return Err(AttemptFailure::Rejected(Unsupported::Aead(*aead_algorithm)));
                }
                let ikm = self.derive(*symmetric_algorithm, skesk, passphrase)?;
                let info = [0xC3, 6, u8::from(*symmetric_algorithm), u8::from(*aead_algorithm)];
                let mut kek = Zeroizing::new(vec![0u8; ikm.len()]);
                self.backend
                    .hkdf_sha256(&ikm, None, &info, &mut kek)
                    .map_err(AttemptFailure::Crypto)?;
                let key = self
                    .backend
                    .aead_decrypt(
                        *symmetric_algorithm,
                        *aead_algorithm,
                        &kek,
                        iv,
                        &info,
                        encrypted_key,
                    )
                    .map_err(AttemptFailure::Crypto)?;
                Ok(Candidate { algorithm: None, key, authenticated: true })
            },
        }
    }

    /// Validates a candidate by decrypting the layer under it.
    fn accept(
        &self,
        candidate: Candidate,
        data: &IntegrityProtectedData,
        source: KeySource,
    ) -> Result<ResolvedSessionKey, AttemptFailure> {
        let algorithm = match (data, candidate.algorithm) {
            (IntegrityProtectedData::V2 { symmetric_algorithm, .. }, None) => *symmetric_algorithm,
            (IntegrityProtectedData::V2 { symmetric_algorithm, .. }, Some(algorithm)) => {
                if algorithm != *symmetric_algorithm {
                    return Err(AttemptFailure::InvalidSessionKey);
                }
                algorithm
            },
            (IntegrityProtectedData::V1 { .. }, Some(algorithm)) => algorithm,
            (IntegrityProtectedData::V1 { .. }, None) => {
                return Err(AttemptFailure::InvalidSessionKey);
            },
        };

        if !self.policy.is_symmetric_algorithm_acceptable(algorithm) {
            // An unauthenticated key decrypted under the wrong passphrase
            // names a random cipher.
            return Err(if candidate.authenticated {
                AttemptFailure::Rejected(Unsupported::Symmetric(algorithm))
            } else {
                AttemptFailure::InvalidSessionKey
            });
        }
        if algorithm.key_size() != Some(candidate.key.len()) {
            return Err(AttemptFailure::InvalidSessionKey);
        }

        if !candidate.authenticated {
            let passed = quick_check(self.backend, data, algorithm, &candidate.key)
                .map_err(AttemptFailure::Crypto)?;
            if !passed {
                return Err(AttemptFailure::QuickCheckFailed);
            }
        }

        let session_key = SessionKey::new(Some(algorithm), candidate.key.to_vec());
        let plaintext = decrypt(self.backend, data, session_key.clone()).map_err(|err| {
            trace!(?source, %err, "candidate failed to decrypt the layer");
            match err {
                Error::IntegrityCheckFailed { reason } => {
                    AttemptFailure::IntegrityCheckFailed { reason }
                },
                Error::UnsupportedAlgorithm(unsupported) => {
                    AttemptFailure::Crypto(CryptoError::Unsupported(unsupported))
                },
                Error::Crypto(err) => AttemptFailure::Crypto(err),
                other => AttemptFailure::Crypto(CryptoError::InvalidParameters {
                    reason: other.to_string(),
                }),
            }
        })?;
        Ok(ResolvedSessionKey {
            algorithm,
            session_key,
            source,
            plaintext: Plaintext::new(plaintext),
        })
    }
}
