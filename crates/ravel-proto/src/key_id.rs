//! Key identifiers and key capability flags.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Eight-octet key ID.
///
/// The all-zero key ID is the wildcard used by anonymous recipients.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId([u8; 8]);

impl KeyId {
    /// Wildcard key ID of an anonymous recipient.
    pub const WILDCARD: Self = Self([0; 8]);

    /// Creates a key ID from its octets.
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Raw octets.
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// True for the all-zero wildcard.
    pub fn is_wildcard(&self) -> bool {
        *self == Self::WILDCARD
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({self})")
    }
}

/// Key fingerprint.
///
/// Version 4 fingerprints are SHA-1 (20 octets), version 6 fingerprints are
/// SHA2-256 (32 octets).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fingerprint {
    /// Version 4 key fingerprint.
    V4([u8; 20]),
    /// Version 6 key fingerprint.
    V6([u8; 32]),
}

impl Fingerprint {
    /// Builds a fingerprint from a key version and its octets.
    ///
    /// Returns `None` when the length does not fit the version.
    pub fn from_bytes(version: u8, bytes: &[u8]) -> Option<Self> {
        match version {
            4 => bytes.try_into().ok().map(Self::V4),
            6 => bytes.try_into().ok().map(Self::V6),
            _ => None,
        }
    }

    /// Key version this fingerprint belongs to.
    pub const fn version(&self) -> u8 {
        match self {
            Self::V4(_) => 4,
            Self::V6(_) => 6,
        }
    }

    /// Raw octets.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::V4(bytes) => bytes,
            Self::V6(bytes) => bytes,
        }
    }

    /// Key ID derived from this fingerprint.
    ///
    /// Version 4 uses the low 64 bits, version 6 the high 64 bits.
    pub fn key_id(&self) -> KeyId {
        let mut id = [0u8; 8];
        match self {
            Self::V4(bytes) => id.copy_from_slice(&bytes[12..]),
            Self::V6(bytes) => id.copy_from_slice(&bytes[..8]),
        }
        KeyId(id)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.as_bytes()))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint(v{} {self})", self.version())
    }
}

/// Either form of key reference found in packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyIdentifier {
    /// Short key ID.
    KeyId(KeyId),
    /// Full fingerprint.
    Fingerprint(Fingerprint),
}

impl KeyIdentifier {
    /// Key ID of this reference, derived if it is a fingerprint.
    pub fn key_id(&self) -> KeyId {
        match self {
            Self::KeyId(id) => *id,
            Self::Fingerprint(fingerprint) => fingerprint.key_id(),
        }
    }

    /// True if both references can denote the same key.
    ///
    /// Two fingerprints must be equal. Otherwise key IDs are compared.
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Fingerprint(a), Self::Fingerprint(b)) => a == b,
            _ => self.key_id() == other.key_id(),
        }
    }

    /// True if this reference denotes the key with `fingerprint`.
    pub fn matches_fingerprint(&self, fingerprint: &Fingerprint) -> bool {
        self.matches(&Self::Fingerprint(*fingerprint))
    }
}

impl From<KeyId> for KeyIdentifier {
    fn from(id: KeyId) -> Self {
        Self::KeyId(id)
    }
}

impl From<Fingerprint> for KeyIdentifier {
    fn from(fingerprint: Fingerprint) -> Self {
        Self::Fingerprint(fingerprint)
    }
}

impl fmt::Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyId(id) => id.fmt(f),
            Self::Fingerprint(fingerprint) => fingerprint.fmt(f),
        }
    }
}

bitflags! {
    /// Key usage flags (RFC 9580 section 5.2.3.29).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct KeyFlags: u8 {
        /// May certify other keys.
        const CERTIFY = 0x01;
        /// May sign data.
        const SIGN_DATA = 0x02;
        /// May encrypt communications.
        const ENCRYPT_COMMUNICATIONS = 0x04;
        /// May encrypt storage.
        const ENCRYPT_STORAGE = 0x08;
        /// Private component may be split.
        const SPLIT = 0x10;
        /// May authenticate.
        const AUTHENTICATE = 0x20;
        /// Private component may be shared.
        const SHARED = 0x80;
    }
}

impl KeyFlags {
    /// Either encryption flag.
    pub const ENCRYPT: Self = Self::ENCRYPT_COMMUNICATIONS.union(Self::ENCRYPT_STORAGE);

    /// True if the key may decrypt messages.
    pub fn can_encrypt(self) -> bool {
        self.intersects(Self::ENCRYPT)
    }

    /// True if the key may sign data.
    pub fn can_sign(self) -> bool {
        self.contains(Self::SIGN_DATA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_key_id_is_low_bits() {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let fingerprint = Fingerprint::V4(bytes);
        assert_eq!(fingerprint.key_id(), KeyId::new([1, 2, 3, 4, 5, 6, 7, 8]));
    }

    #[test]
    fn v6_key_id_is_high_bits() {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&[8, 7, 6, 5, 4, 3, 2, 1]);
        let fingerprint = Fingerprint::V6(bytes);
        assert_eq!(fingerprint.key_id(), KeyId::new([8, 7, 6, 5, 4, 3, 2, 1]));
    }

    #[test]
    fn identifiers_cross_match() {
        let fingerprint = Fingerprint::V4([0xAB; 20]);
        let by_id = KeyIdentifier::from(fingerprint.key_id());
        let by_fingerprint = KeyIdentifier::from(fingerprint);

        assert!(by_id.matches(&by_fingerprint));
        assert!(by_fingerprint.matches(&by_id));
        assert!(!by_fingerprint.matches(&KeyIdentifier::Fingerprint(Fingerprint::V4([0xAC; 20]))));
    }

    #[test]
    fn fingerprint_length_must_fit_version() {
        assert!(Fingerprint::from_bytes(4, &[0; 20]).is_some());
        assert!(Fingerprint::from_bytes(4, &[0; 32]).is_none());
        assert!(Fingerprint::from_bytes(5, &[0; 32]).is_none());
    }

    #[test]
    fn key_id_display_is_upper_hex() {
        let id = KeyId::new([0xde, 0xad, 0xbe, 0xef, 0, 1, 2, 3]);
        assert_eq!(id.to_string(), "DEADBEEF00010203");
        assert!(KeyId::WILDCARD.is_wildcard());
    }

    #[test]
    fn encryption_flags() {
        assert!(KeyFlags::ENCRYPT_STORAGE.can_encrypt());
        assert!(!KeyFlags::SIGN_DATA.can_encrypt());
        assert!(KeyFlags::SIGN_DATA.can_sign());
    }
}
