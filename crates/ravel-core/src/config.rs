//! Resource limits and algorithm policy.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ravel_proto::{
    AeadAlgorithm, CompressionAlgorithm, HashAlgorithm, PublicKeyAlgorithm, Signature,
    SymmetricAlgorithm,
};
use serde::{Deserialize, Serialize};

/// Limits applied while consuming one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionConfig {
    /// Maximum number of encrypted or compressed layers nested inside the
    /// outermost message, which itself is not counted.
    pub max_nesting_depth: usize,

    /// Maximum body length of a single packet, in octets.
    pub max_packet_length: usize,

    /// Maximum output of one compressed layer, in octets.
    pub max_decompressed_length: u64,

    /// Algorithm acceptance and signature time checks.
    pub policy: Policy,
}

impl Default for DecryptionConfig {
    fn default() -> Self {
        Self {
            max_nesting_depth: 16,
            max_packet_length: 512 * 1024 * 1024,
            max_decompressed_length: 1024 * 1024 * 1024,
            policy: Policy::default(),
        }
    }
}

/// Algorithm acceptance rules.
///
/// Anything not listed is rejected. Rejection of a layer algorithm aborts
/// the message with `UnsupportedAlgorithm`; rejection of a signature
/// algorithm only marks that signature unverified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Ciphers accepted for encrypted data.
    pub symmetric_algorithms: Vec<SymmetricAlgorithm>,
    /// AEAD modes accepted for version 2 encrypted data.
    pub aead_algorithms: Vec<AeadAlgorithm>,
    /// Hash algorithms accepted in data signatures.
    pub signature_hash_algorithms: Vec<HashAlgorithm>,
    /// Public-key algorithms accepted for decryption and signing keys.
    pub public_key_algorithms: Vec<PublicKeyAlgorithm>,
    /// Compression algorithms accepted.
    pub compression_algorithms: Vec<CompressionAlgorithm>,
    /// Tolerance for signatures created slightly in the future.
    pub clock_skew: Duration,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            symmetric_algorithms: vec![
                SymmetricAlgorithm::Aes128,
                SymmetricAlgorithm::Aes192,
                SymmetricAlgorithm::Aes256,
            ],
            aead_algorithms: vec![AeadAlgorithm::Eax, AeadAlgorithm::Ocb, AeadAlgorithm::Gcm],
            signature_hash_algorithms: vec![
                HashAlgorithm::Sha224,
                HashAlgorithm::Sha256,
                HashAlgorithm::Sha384,
                HashAlgorithm::Sha512,
            ],
            public_key_algorithms: vec![PublicKeyAlgorithm::Ed25519, PublicKeyAlgorithm::X25519],
            compression_algorithms: vec![
                CompressionAlgorithm::Uncompressed,
                CompressionAlgorithm::Zip,
                CompressionAlgorithm::Zlib,
            ],
            clock_skew: Duration::from_secs(60),
        }
    }
}

fn seconds(time: u32) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(u64::from(time))
}

impl Policy {
    /// Whether `algorithm` may encrypt data.
    pub fn is_symmetric_algorithm_acceptable(&self, algorithm: SymmetricAlgorithm) -> bool {
        self.symmetric_algorithms.contains(&algorithm)
    }

    /// Whether `algorithm` may protect version 2 encrypted data.
    pub fn is_aead_algorithm_acceptable(&self, algorithm: AeadAlgorithm) -> bool {
        self.aead_algorithms.contains(&algorithm)
    }

    /// Whether `algorithm` may hash signed data.
    pub fn is_hash_algorithm_acceptable(&self, algorithm: HashAlgorithm) -> bool {
        self.signature_hash_algorithms.contains(&algorithm)
    }

    /// Whether keys of `algorithm` may be used.
    pub fn is_public_key_algorithm_acceptable(&self, algorithm: PublicKeyAlgorithm) -> bool {
        self.public_key_algorithms.contains(&algorithm)
    }

    /// Whether `algorithm` may compress data.
    pub fn is_compression_algorithm_acceptable(&self, algorithm: CompressionAlgorithm) -> bool {
        self.compression_algorithms.contains(&algorithm)
    }

    /// Whether `signature` is still valid at `now`.
    ///
    /// A signature without an expiration time, or with expiration time zero,
    /// never expires.
    pub fn is_signature_not_expired(&self, signature: &Signature, now: SystemTime) -> bool {
        match (signature.creation_time(), signature.expiration_time()) {
            (Some(created), Some(lifetime)) if lifetime > 0 => {
                now < seconds(created) + Duration::from_secs(u64::from(lifetime))
            },
            _ => true,
        }
    }

    /// Whether `signature` was not created after `now`, allowing for
    /// [`clock_skew`](Self::clock_skew).
    pub fn is_signature_created_in_past(&self, signature: &Signature, now: SystemTime) -> bool {
        signature.creation_time().is_some_and(|created| seconds(created) <= now + self.clock_skew)
    }
}
