//! Algorithm and format identifiers.
//!
//! Every identifier is a one-octet registry value. Values this crate does not
//! know are kept in an `Other` arm so that a packet naming them still parses;
//! rejection happens when the algorithm is actually needed.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! registry {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "u8", into = "u8")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// Identifier not known to this implementation.
            Other(u8),
        }

        impl From<u8> for $name {
            fn from(value: u8) -> Self {
                match value {
                    $( $value => Self::$variant, )+
                    other => Self::Other(other),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $value, )+
                    $name::Other(other) => other,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Self::Other(id) => write!(f, "unknown({id})"),
                    known => fmt::Debug::fmt(known, f),
                }
            }
        }
    };
}

registry! {
    /// Symmetric cipher identifiers (RFC 9580 section 9.3).
    SymmetricAlgorithm {
        /// Unencrypted data. Never acceptable for a session key.
        Plaintext = 0,
        /// IDEA.
        Idea = 1,
        /// Triple-DES.
        TripleDes = 2,
        /// CAST5.
        Cast5 = 3,
        /// Blowfish.
        Blowfish = 4,
        /// AES with 128-bit key.
        Aes128 = 7,
        /// AES with 192-bit key.
        Aes192 = 8,
        /// AES with 256-bit key.
        Aes256 = 9,
        /// Twofish with 256-bit key.
        Twofish = 10,
        /// Camellia with 128-bit key.
        Camellia128 = 11,
        /// Camellia with 192-bit key.
        Camellia192 = 12,
        /// Camellia with 256-bit key.
        Camellia256 = 13,
    }
}

impl SymmetricAlgorithm {
    /// Key length in octets, if the algorithm is known.
    pub fn key_size(self) -> Option<usize> {
        match self {
            Self::Idea | Self::Cast5 | Self::Blowfish | Self::Aes128 | Self::Camellia128 => {
                Some(16)
            },
            Self::TripleDes | Self::Aes192 | Self::Camellia192 => Some(24),
            Self::Aes256 | Self::Twofish | Self::Camellia256 => Some(32),
            Self::Plaintext | Self::Other(_) => None,
        }
    }

    /// Cipher block length in octets, if the algorithm is known.
    pub fn block_size(self) -> Option<usize> {
        match self {
            Self::Idea | Self::TripleDes | Self::Cast5 | Self::Blowfish => Some(8),
            Self::Aes128
            | Self::Aes192
            | Self::Aes256
            | Self::Twofish
            | Self::Camellia128
            | Self::Camellia192
            | Self::Camellia256 => Some(16),
            Self::Plaintext | Self::Other(_) => None,
        }
    }
}

registry! {
    /// AEAD mode identifiers (RFC 9580 section 9.6).
    AeadAlgorithm {
        /// EAX mode.
        Eax = 1,
        /// OCB mode.
        Ocb = 2,
        /// GCM mode.
        Gcm = 3,
    }
}

impl AeadAlgorithm {
    /// Nonce length in octets.
    pub fn nonce_size(self) -> Option<usize> {
        match self {
            Self::Eax => Some(16),
            Self::Ocb => Some(15),
            Self::Gcm => Some(12),
            Self::Other(_) => None,
        }
    }

    /// Authentication tag length in octets. All registered modes use 16.
    pub fn tag_size(self) -> Option<usize> {
        match self {
            Self::Eax | Self::Ocb | Self::Gcm => Some(16),
            Self::Other(_) => None,
        }
    }
}

registry! {
    /// Hash algorithm identifiers (RFC 9580 section 9.5).
    HashAlgorithm {
        /// MD5.
        Md5 = 1,
        /// SHA-1.
        Sha1 = 2,
        /// RIPEMD-160.
        Ripemd160 = 3,
        /// SHA2-256.
        Sha256 = 8,
        /// SHA2-384.
        Sha384 = 9,
        /// SHA2-512.
        Sha512 = 10,
        /// SHA2-224.
        Sha224 = 11,
        /// SHA3-256.
        Sha3_256 = 12,
        /// SHA3-512.
        Sha3_512 = 14,
    }
}

impl HashAlgorithm {
    /// Digest length in octets, if the algorithm is known.
    pub fn digest_size(self) -> Option<usize> {
        match self {
            Self::Md5 => Some(16),
            Self::Sha1 | Self::Ripemd160 => Some(20),
            Self::Sha224 => Some(28),
            Self::Sha256 | Self::Sha3_256 => Some(32),
            Self::Sha384 => Some(48),
            Self::Sha512 | Self::Sha3_512 => Some(64),
            Self::Other(_) => None,
        }
    }
}

registry! {
    /// Public-key algorithm identifiers (RFC 9580 section 9.1).
    PublicKeyAlgorithm {
        /// RSA, encrypt or sign.
        Rsa = 1,
        /// RSA, encrypt only (deprecated).
        RsaEncryptOnly = 2,
        /// RSA, sign only (deprecated).
        RsaSignOnly = 3,
        /// Elgamal, encrypt only.
        Elgamal = 16,
        /// DSA.
        Dsa = 17,
        /// ECDH.
        Ecdh = 18,
        /// ECDSA.
        Ecdsa = 19,
        /// EdDSA in the legacy encoding.
        EdDsaLegacy = 22,
        /// X25519.
        X25519 = 25,
        /// X448.
        X448 = 26,
        /// Ed25519.
        Ed25519 = 27,
        /// Ed448.
        Ed448 = 28,
    }
}

registry! {
    /// Compression algorithm identifiers (RFC 9580 section 9.4).
    CompressionAlgorithm {
        /// No compression.
        Uncompressed = 0,
        /// Raw DEFLATE (RFC 1951).
        Zip = 1,
        /// ZLIB (RFC 1950).
        Zlib = 2,
        /// BZip2.
        Bzip2 = 3,
    }
}

registry! {
    /// Signature type identifiers (RFC 9580 section 5.2.1).
    SignatureType {
        /// Signature over a binary document.
        Binary = 0x00,
        /// Signature over a canonical text document.
        Text = 0x01,
        /// Standalone signature.
        Standalone = 0x02,
        /// Generic certification of a user ID.
        GenericCertification = 0x10,
        /// Subkey binding signature.
        SubkeyBinding = 0x18,
        /// Direct key signature.
        DirectKey = 0x1F,
        /// Key revocation signature.
        KeyRevocation = 0x20,
        /// Timestamp signature.
        Timestamp = 0x40,
    }
}

registry! {
    /// Literal data format octet (RFC 9580 section 5.9).
    LiteralFormat {
        /// Binary data.
        Binary = b'b',
        /// Text data.
        Text = b't',
        /// UTF-8 text data.
        Utf8 = b'u',
        /// Local-mode data (deprecated).
        Local = b'l',
        /// MIME message body (deprecated).
        Mime = b'm',
    }
}

/// An algorithm or mechanism named by a message that cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unsupported {
    /// Symmetric cipher.
    Symmetric(SymmetricAlgorithm),
    /// AEAD mode.
    Aead(AeadAlgorithm),
    /// Hash algorithm.
    Hash(HashAlgorithm),
    /// Public-key algorithm.
    PublicKey(PublicKeyAlgorithm),
    /// Compression algorithm.
    Compression(CompressionAlgorithm),
    /// String-to-key specifier type.
    S2k(u8),
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symmetric(a) => write!(f, "symmetric algorithm {a}"),
            Self::Aead(a) => write!(f, "AEAD algorithm {a}"),
            Self::Hash(a) => write!(f, "hash algorithm {a}"),
            Self::PublicKey(a) => write!(f, "public-key algorithm {a}"),
            Self::Compression(a) => write!(f, "compression algorithm {a}"),
            Self::S2k(kind) => write!(f, "S2K type {kind}"),
        }
    }
}
