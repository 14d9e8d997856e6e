//! Correlation of signatures with the data they cover.
//!
//! # Design
//!
//! A one-pass signature announces a signature before the data. It opens an
//! obligation carrying a hash context; literal data is fed to every open
//! context as it is read; the trailing signature packet closes the most
//! recent obligation (last in, first out, matching the nesting the grammar
//! enforces).
//!
//! A signature that precedes the data without a one-pass announcement is a
//! prefixed signature. It is hashed the same way and settled when the
//! message it belongs to ends.
//!
//! # Security Properties
//!
//! - **Never fatal**: Every failure becomes a [`SignatureFailure`] in the
//!   metadata. Decryption proceeds regardless.
//! - **Fail closed**: A signature is `verified` only after every check
//!   passed. Obligations still open when the stream is dropped are discarded
//!   and never reported.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ravel_crypto::{CryptoBackend, SignatureHasher, VerifyingKey};
use ravel_proto::{
    Fingerprint, HashAlgorithm, KeyIdentifier, OnePassSignature, PublicKeyAlgorithm, Signature,
    SignatureType,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    config::Policy, credentials::CertificateProvider, env::Environment, metadata::LayerPosition,
};

/// Why a signature did not verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SignatureFailure {
    /// Signature type, hash or key algorithm differs from its one-pass
    /// announcement.
    #[error("signature does not match its one-pass signature")]
    OnePassMismatch,
    /// Issuer differs from its one-pass announcement.
    #[error("signature issuer does not match its one-pass signature")]
    IssuerMismatch,
    /// Hashed area has a critical subpacket that cannot be interpreted.
    #[error("unknown critical subpacket {tag}")]
    UnknownCriticalSubpacket {
        /// Subpacket type.
        tag: u8,
    },
    /// Hash algorithm refused by policy.
    #[error("hash algorithm {0} rejected by policy")]
    HashRejected(HashAlgorithm),
    /// Key algorithm refused by policy.
    #[error("public-key algorithm {0} rejected by policy")]
    PublicKeyRejected(PublicKeyAlgorithm),
    /// No certificate for the issuer.
    #[error("no certificate for the issuer")]
    MissingCertificate,
    /// Issuer key may not sign data.
    #[error("issuer key is not a signing key")]
    NotSigningKey,
    /// Issuer key has a different algorithm than the signature.
    #[error("issuer key algorithm does not match the signature")]
    KeyAlgorithmMismatch,
    /// Hashed area lacks a creation time.
    #[error("signature has no creation time")]
    MissingCreationTime,
    /// Creation time lies in the future.
    #[error("signature created in the future")]
    CreatedInFuture,
    /// Creation time precedes the issuer key.
    #[error("signature predates its key")]
    PredatesKey,
    /// Validity period has passed.
    #[error("signature expired")]
    Expired,
    /// No hash implementation for the algorithm.
    #[error("unsupported hash algorithm {0}")]
    UnsupportedHash(HashAlgorithm),
    /// Leftmost digest octets do not match.
    #[error("digest prefix mismatch")]
    DigestPrefixMismatch,
    /// Cryptographic verification failed.
    #[error("bad signature")]
    BadSignature,
}

/// How a signature was placed relative to its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureKind {
    /// Announced by a one-pass signature, trailing the data.
    OnePass,
    /// Preceding the data.
    Prefixed,
}

/// Outcome of checking one signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureVerification {
    /// Issuer named by the signature or its announcement.
    pub issuer: Option<KeyIdentifier>,
    /// Fingerprint of the certificate used, if one was found.
    pub signer: Option<Fingerprint>,
    /// Signature type.
    pub signature_type: SignatureType,
    /// Creation time from the hashed area.
    pub creation_time: Option<SystemTime>,
    /// Digest algorithm.
    pub hash_algorithm: HashAlgorithm,
    /// Placement.
    pub kind: SignatureKind,
    /// True only if every check passed.
    pub verified: bool,
    /// First check that failed.
    pub failure: Option<SignatureFailure>,
}

struct Obligation {
    ops: OnePassSignature,
    hasher: Option<SignatureHasher>,
    position: LayerPosition,
}

struct Prefixed {
    signature: Signature,
    hasher: Option<SignatureHasher>,
    position: LayerPosition,
    depth: usize,
}

/// Stack of open signature obligations for one message.
pub struct SignatureCorrelation<'a> {
    backend: &'a dyn CryptoBackend,
    certificates: &'a dyn CertificateProvider,
    env: &'a dyn Environment,
    policy: Policy,
    pending: Vec<Obligation>,
    prefixed: Vec<Prefixed>,
}

impl<'a> SignatureCorrelation<'a> {
    /// Empty correlation stack.
    pub fn new(
        backend: &'a dyn CryptoBackend,
        certificates: &'a dyn CertificateProvider,
        env: &'a dyn Environment,
        policy: Policy,
    ) -> Self {
        Self { backend, certificates, env, policy, pending: Vec::new(), prefixed: Vec::new() }
    }

    /// Number of one-pass signatures awaiting their signature packet.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn hasher(
        &self,
        algorithm: HashAlgorithm,
        signature_type: SignatureType,
    ) -> Option<SignatureHasher> {
        match self.backend.hasher(algorithm) {
            Ok(inner) => Some(SignatureHasher::new(inner, signature_type)),
            Err(err) => {
                debug!(%algorithm, %err, "no hash context for signature");
                None
            },
        }
    }

    /// Opens an obligation for a one-pass signature found at `position`.
    pub fn on_one_pass_signature(&mut self, ops: OnePassSignature, position: LayerPosition) {
        let hasher = self.hasher(ops.hash_algorithm, ops.signature_type);
        debug!(issuer = %ops.issuer, depth = position.depth(), "one-pass signature opened");
        self.pending.push(Obligation { ops, hasher, position });
    }

    /// Registers a signature that precedes the data it covers. `depth` is
    /// the nesting depth of the message it belongs to.
    pub fn on_prefixed_signature(
        &mut self,
        signature: Signature,
        position: LayerPosition,
        depth: usize,
    ) {
        let hasher = self.hasher(signature.hash_algorithm, signature.signature_type);
        self.prefixed.push(Prefixed { signature, hasher, position, depth });
    }

    /// Feeds signed data to every open hash context.
    pub fn update(&mut self, data: &[u8]) {
        let hashers = self
            .pending
            .iter_mut()
            .map(|o| &mut o.hasher)
            .chain(self.prefixed.iter_mut().map(|p| &mut p.hasher));
        for hasher in hashers.flatten() {
            hasher.update(data);
        }
    }

    /// Closes the most recent obligation with its signature packet.
    ///
    /// Returns `None` when no obligation is open; the grammar rejects such a
    /// message before it gets here.
    pub fn on_signature(
        &mut self,
        signature: &Signature,
    ) -> Option<(LayerPosition, SignatureVerification)> {
        let obligation = self.pending.pop()?;
        let Obligation { ops, hasher, position } = obligation;
        let verification = self.verify(signature, hasher, Some(&ops), SignatureKind::OnePass);
        Some((position, verification))
    }

    /// Settles every prefixed signature of messages at `depth` or deeper.
    pub fn finish_prefixed(&mut self, depth: usize) -> Vec<(LayerPosition, SignatureVerification)> {
        let split =
            self.prefixed.iter().position(|p| p.depth >= depth).unwrap_or(self.prefixed.len());
        let settled: Vec<Prefixed> = self.prefixed.drain(split..).collect();
        settled
            .into_iter()
            .map(|p| {
                let verification =
                    self.verify(&p.signature, p.hasher, None, SignatureKind::Prefixed);
                (p.position, verification)
            })
            .collect()
    }

    fn verify(
        &self,
        signature: &Signature,
        hasher: Option<SignatureHasher>,
        ops: Option<&OnePassSignature>,
        kind: SignatureKind,
    ) -> SignatureVerification {
        let issuer = signature
            .issuers()
            .first()
            .copied()
            .or_else(|| ops.map(|ops| KeyIdentifier::KeyId(ops.issuer)));
        let mut verification = SignatureVerification {
            issuer,
            signer: None,
            signature_type: signature.signature_type,
            creation_time: signature.creation_time().map(seconds),
            hash_algorithm: signature.hash_algorithm,
            kind,
            verified: false,
            failure: None,
        };

        let result = self.precheck(signature, ops).and_then(|()| {
            let key = self.certificate(signature, ops)?;
            verification.signer = Some(key.fingerprint());
            self.check_with_key(signature, key, hasher)
        });
        match result {
            Ok(()) => {
                debug!(signer = ?verification.signer, ?kind, "signature verified");
                verification.verified = true;
            },
            Err(failure) => {
                warn!(issuer = ?verification.issuer, ?kind, %failure, "signature rejected");
                verification.failure = Some(failure);
            },
        }
        verification
    }

    fn precheck(
        &self,
        signature: &Signature,
        ops: Option<&OnePassSignature>,
    ) -> Result<(), SignatureFailure> {
        if let Some(ops) = ops {
            if ops.signature_type != signature.signature_type
                || ops.hash_algorithm != signature.hash_algorithm
                || ops.public_key_algorithm != signature.public_key_algorithm
            {
                return Err(SignatureFailure::OnePassMismatch);
            }
            let announced = KeyIdentifier::KeyId(ops.issuer);
            let issuers = signature.issuers();
            if !issuers.is_empty() && !issuers.iter().any(|id| id.matches(&announced)) {
                return Err(SignatureFailure::IssuerMismatch);
            }
        }
        if let Some(tag) = signature.unknown_critical_subpacket() {
            return Err(SignatureFailure::UnknownCriticalSubpacket { tag });
        }
        if !self.policy.is_hash_algorithm_acceptable(signature.hash_algorithm) {
            return Err(SignatureFailure::HashRejected(signature.hash_algorithm));
        }
        if !self.policy.is_public_key_algorithm_acceptable(signature.public_key_algorithm) {
            return Err(SignatureFailure::PublicKeyRejected(signature.public_key_algorithm));
        }
        Ok(())
    }

    fn certificate(
        &self,
        signature: &Signature,
        ops: Option<&OnePassSignature>,
    ) -> Result<&'a VerifyingKey, SignatureFailure> {
        let announced = ops.map(|ops| KeyIdentifier::KeyId(ops.issuer));
        signature
            .issuers()
            .into_iter()
            .chain(announced)
            .find_map(|id| self.certificates.public_key_by_identifier(&id))
            .ok_or(SignatureFailure::MissingCertificate)
    }

    fn check_with_key(
        &self,
        signature: &Signature,
        key: &VerifyingKey,
        hasher: Option<SignatureHasher>,
    ) -> Result<(), SignatureFailure> {
        if !key.flags().can_sign() {
            return Err(SignatureFailure::NotSigningKey);
        }
        if key.algorithm() != signature.public_key_algorithm {
            return Err(SignatureFailure::KeyAlgorithmMismatch);
        }

        let created = signature
            .creation_time()
            .map(seconds)
            .ok_or(SignatureFailure::MissingCreationTime)?;
        let now = self.env.now();
        if !self.policy.is_signature_created_in_past(signature, now) {
            return Err(SignatureFailure::CreatedInFuture);
        }
        if created < key.creation_time() {
            return Err(SignatureFailure::PredatesKey);
        }
        if !self.policy.is_signature_not_expired(signature, now) {
            return Err(SignatureFailure::Expired);
        }

        let hasher = hasher.ok_or(SignatureFailure::UnsupportedHash(signature.hash_algorithm))?;
        let digest = hasher.finalize(&signature.hash_trailer());
        if digest.get(..2) != Some(&signature.digest_prefix[..]) {
            return Err(SignatureFailure::DigestPrefixMismatch);
        }
        self.backend
            .verify(key, signature.hash_algorithm, &digest, &signature.material)
            .map_err(|_| SignatureFailure::BadSignature)
    }
}

fn seconds(time: u32) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(u64::from(time))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ravel_crypto::{RustCrypto, ed25519};
    use ravel_proto::{KeyFlags, SignatureMaterial, Subpacket, SubpacketKind};

    use super::*;
    use crate::credentials::Certificates;

    const SEED: [u8; 32] = [3; 32];
    const KEY_CREATED: u32 = 1_600_000_000;
    const SIGNED_AT: u32 = 1_700_000_000;

    struct FixedClock(SystemTime);

    impl Environment for FixedClock {
        fn now(&self) -> SystemTime {
            self.0
        }
    }

    fn clock() -> FixedClock {
        FixedClock(seconds(SIGNED_AT + 10))
    }

    fn signing_key() -> VerifyingKey {
        VerifyingKey::ed25519(ed25519::public_key(&SEED), KEY_CREATED, KeyFlags::SIGN_DATA)
    }

    fn ops(key: &VerifyingKey) -> OnePassSignature {
        OnePassSignature {
            signature_type: SignatureType::Binary,
            hash_algorithm: HashAlgorithm::Sha256,
            public_key_algorithm: PublicKeyAlgorithm::Ed25519,
            issuer: key.key_id(),
            last: true,
        }
    }

    fn sign_with(
        seed: &[u8; 32],
        key: &VerifyingKey,
        data: &[u8],
        hashed: Vec<Subpacket>,
    ) -> Signature {
        let mut hashed_subpackets = vec![
            Subpacket::new(SubpacketKind::CreationTime(SIGNED_AT)),
            Subpacket::new(SubpacketKind::IssuerFingerprint(key.fingerprint())),
        ];
        hashed_subpackets.extend(hashed);
        let unsigned = Signature::new(
            SignatureType::Binary,
            PublicKeyAlgorithm::Ed25519,
            HashAlgorithm::Sha256,
            hashed_subpackets.clone(),
            Vec::new(),
            [0; 2],
            SignatureMaterial::Ed25519([0; 64]),
        );
        let mut ctx = RustCrypto.hasher(HashAlgorithm::Sha256).unwrap();
        ctx.update(data);
        ctx.update(&unsigned.hash_trailer());
        let digest = ctx.finalize();
        Signature::new(
            SignatureType::Binary,
            PublicKeyAlgorithm::Ed25519,
            HashAlgorithm::Sha256,
            hashed_subpackets,
            Vec::new(),
            [digest[0], digest[1]],
            SignatureMaterial::Ed25519(ed25519::sign(seed, &digest)),
        )
    }

    fn run(
        certificates: &Certificates,
        signature: &Signature,
        data: &[u8],
    ) -> SignatureVerification {
        let env = clock();
        let key = signing_key();
        let mut correlation =
            SignatureCorrelation::new(&RustCrypto, certificates, &env, Policy::default());
        correlation.on_one_pass_signature(ops(&key), LayerPosition::root());
        correlation.update(data);
        let (position, verification) = correlation.on_signature(signature).unwrap();
        assert_eq!(position, LayerPosition::root());
        assert_eq!(correlation.pending(), 0);
        verification
    }

    #[test]
    fn one_pass_signature_verifies() {
        let key = signing_key();
        let signature = sign_with(&SEED, &key, b"signed", Vec::new());
        let certificates = Certificates::new().with_key(key.clone());

        let verification = run(&certificates, &signature, b"signed");
        assert!(verification.verified, "{:?}", verification.failure);
        assert_eq!(verification.signer, Some(key.fingerprint()));
        assert_eq!(verification.kind, SignatureKind::OnePass);
    }

    #[test]
    fn data_fed_in_pieces_hashes_the_same() {
        let key = signing_key();
        let signature = sign_with(&SEED, &key, b"split across reads", Vec::new());
        let certificates = Certificates::new().with_key(key.clone());
        let env = clock();

        let mut correlation =
            SignatureCorrelation::new(&RustCrypto, &certificates, &env, Policy::default());
        correlation.on_one_pass_signature(ops(&key), LayerPosition::root());
        for piece in [&b"split "[..], b"across", b" reads"] {
            correlation.update(piece);
        }
        assert!(correlation.on_signature(&signature).unwrap().1.verified);
    }

    #[test]
    fn altered_data_fails() {
        let key = signing_key();
        let signature = sign_with(&SEED, &key, b"original", Vec::new());
        let certificates = Certificates::new().with_key(key);

        let verification = run(&certificates, &signature, b"tampered");
        assert!(!verification.verified);
        assert!(matches!(
            verification.failure,
            Some(SignatureFailure::DigestPrefixMismatch | SignatureFailure::BadSignature)
        ));
    }

    #[test]
    fn unknown_certificate_is_reported_not_fatal() {
        let key = signing_key();
        let signature = sign_with(&SEED, &key, b"data", Vec::new());
        let verification = run(&Certificates::new(), &signature, b"data");
        assert_eq!(verification.failure, Some(SignatureFailure::MissingCertificate));
        assert_eq!(verification.signer, None);
    }

    #[test]
    fn wrong_key_fails_cryptographic_check() {
        let key = signing_key();
        let signature = sign_with(&[4; 32], &key, b"data", Vec::new());
        let certificates = Certificates::new().with_key(key);
        let verification = run(&certificates, &signature, b"data");
        assert_eq!(verification.failure, Some(SignatureFailure::BadSignature));
    }

    #[test]
    fn expired_signature_is_rejected() {
        let key = signing_key();
        let lifetime = Subpacket::new(SubpacketKind::ExpirationTime(5));
        let signature = sign_with(&SEED, &key, b"data", vec![lifetime]);
        let certificates = Certificates::new().with_key(key);
        let verification = run(&certificates, &signature, b"data");
        assert_eq!(verification.failure, Some(SignatureFailure::Expired));
    }

    #[test]
    fn critical_unknown_subpacket_is_rejected() {
        let key = signing_key();
        let critical = Subpacket::critical(SubpacketKind::Other {
            tag: 100,
            data: bytes::Bytes::from_static(b"?"),
        });
        let signature = sign_with(&SEED, &key, b"data", vec![critical]);
        let certificates = Certificates::new().with_key(key);
        let verification = run(&certificates, &signature, b"data");
        assert_eq!(
            verification.failure,
            Some(SignatureFailure::UnknownCriticalSubpacket { tag: 100 })
        );
    }

    #[test]
    fn encryption_only_key_cannot_sign() {
        let key = VerifyingKey::ed25519(ed25519::public_key(&SEED), KEY_CREATED, KeyFlags::ENCRYPT);
        let signature = sign_with(&SEED, &key, b"data", Vec::new());
        let certificates = Certificates::new().with_key(key);
        let verification = run(&certificates, &signature, b"data");
        assert_eq!(verification.failure, Some(SignatureFailure::NotSigningKey));
    }

    #[test]
    fn obligations_close_last_in_first_out() {
        let outer = signing_key();
        let inner_seed = [9u8; 32];
        let inner_public = ed25519::public_key(&inner_seed);
        let inner = VerifyingKey::ed25519(inner_public, KEY_CREATED, KeyFlags::SIGN_DATA);
        let certificates = Certificates::new().with_key(outer.clone()).with_key(inner.clone());
        let env = clock();

        let mut correlation =
            SignatureCorrelation::new(&RustCrypto, &certificates, &env, Policy::default());
        correlation.on_one_pass_signature(ops(&outer), LayerPosition::root());
        correlation.on_one_pass_signature(ops(&inner), LayerPosition::root());
        correlation.update(b"payload");

        let inner_signature = sign_with(&inner_seed, &inner, b"payload", Vec::new());
        let outer_signature = sign_with(&SEED, &outer, b"payload", Vec::new());
        let first = correlation.on_signature(&inner_signature);
        let second = correlation.on_signature(&outer_signature);
        assert!(first.unwrap().1.verified);
        assert!(second.unwrap().1.verified);
        assert!(correlation.on_signature(&sign_with(&SEED, &outer, b"", Vec::new())).is_none());
    }

    #[test]
    fn mismatched_announcement_is_reported() {
        let outer = signing_key();
        let other =
            VerifyingKey::ed25519(ed25519::public_key(&[9; 32]), KEY_CREATED, KeyFlags::SIGN_DATA);
        let signature = sign_with(&[9; 32], &other, b"data", Vec::new());
        let certificates = Certificates::new().with_key(outer).with_key(other);
        let verification = run(&certificates, &signature, b"data");
        assert_eq!(verification.failure, Some(SignatureFailure::IssuerMismatch));
    }

    #[test]
    fn prefixed_signatures_settle_by_depth() {
        let key = signing_key();
        let certificates = Certificates::new().with_key(key.clone());
        let env = clock();

        let mut correlation =
            SignatureCorrelation::new(&RustCrypto, &certificates, &env, Policy::default());
        let signature = sign_with(&SEED, &key, b"prefixed", Vec::new());
        correlation.on_prefixed_signature(signature, LayerPosition::root(), 0);
        correlation.update(b"prefixed");

        assert!(correlation.finish_prefixed(1).is_empty());
        let settled = correlation.finish_prefixed(0);
        assert_eq!(settled.len(), 1);
        assert!(settled[0].1.verified);
        assert_eq!(settled[0].1.kind, SignatureKind::Prefixed);
        assert!(correlation.finish_prefixed(0).is_empty());
    }
}
