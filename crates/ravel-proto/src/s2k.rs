//! String-to-key specifiers (RFC 9580 section 3.7).
//!
//! Only the specifier is modelled here. Turning a passphrase into key
//! material is the crypto backend's job.

use bytes::Bytes;

use crate::{algorithm::HashAlgorithm, codec::body::BodyReader, error::ProtocolError};

/// How a passphrase is turned into a key-encryption key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S2k {
    /// Hash of the passphrase.
    Simple {
        /// Hash algorithm.
        hash: HashAlgorithm,
    },
    /// Hash of salt and passphrase.
    Salted {
        /// Hash algorithm.
        hash: HashAlgorithm,
        /// Eight-octet salt.
        salt: [u8; 8],
    },
    /// Salt and passphrase hashed repeatedly up to a coded octet count.
    IteratedSalted {
        /// Hash algorithm.
        hash: HashAlgorithm,
        /// Eight-octet salt.
        salt: [u8; 8],
        /// Coded count octet, see [`S2k::decode_count`].
        count: u8,
    },
    /// Argon2id memory-hard derivation.
    Argon2 {
        /// Sixteen-octet salt.
        salt: [u8; 16],
        /// Number of passes `t`.
        passes: u8,
        /// Degree of parallelism `p`.
        parallelism: u8,
        /// Memory size exponent: `2^m` KiB.
        memory_exponent: u8,
    },
    /// Specifier type this crate does not know.
    Unknown {
        /// Type octet.
        kind: u8,
        /// Remaining specifier octets, if they could be delimited.
        parameters: Bytes,
    },
}

impl S2k {
    /// Expands the coded iteration count octet into an octet count.
    pub fn decode_count(coded: u8) -> usize {
        (16usize + usize::from(coded & 15)) << ((coded >> 4) + 6)
    }

    /// Type octet of this specifier.
    pub fn kind(&self) -> u8 {
        match self {
            Self::Simple { .. } => 0,
            Self::Salted { .. } => 1,
            Self::IteratedSalted { .. } => 3,
            Self::Argon2 { .. } => 4,
            Self::Unknown { kind, .. } => *kind,
        }
    }

    /// Reads a specifier. An unknown type swallows the rest of `reader`.
    pub(crate) fn decode(reader: &mut BodyReader) -> Result<Self, ProtocolError> {
        let kind = reader.u8()?;
        let s2k = match kind {
            0 => Self::Simple { hash: reader.u8()?.into() },
            1 => Self::Salted { hash: reader.u8()?.into(), salt: reader.array()? },
            3 => Self::IteratedSalted {
                hash: reader.u8()?.into(),
                salt: reader.array()?,
                count: reader.u8()?,
            },
            4 => Self::Argon2 {
                salt: reader.array()?,
                passes: reader.u8()?,
                parallelism: reader.u8()?,
                memory_exponent: reader.u8()?,
            },
            kind => Self::Unknown { kind, parameters: reader.rest() },
        };
        Ok(s2k)
    }

    /// Appends the wire form of this specifier.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.kind());
        match self {
            Self::Simple { hash } => out.push((*hash).into()),
            Self::Salted { hash, salt } => {
                out.push((*hash).into());
                out.extend_from_slice(salt);
            },
            Self::IteratedSalted { hash, salt, count } => {
                out.push((*hash).into());
                out.extend_from_slice(salt);
                out.push(*count);
            },
            Self::Argon2 { salt, passes, parallelism, memory_exponent } => {
                out.extend_from_slice(salt);
                out.extend_from_slice(&[*passes, *parallelism, *memory_exponent]);
            },
            Self::Unknown { parameters, .. } => out.extend_from_slice(parameters),
        }
    }
}
