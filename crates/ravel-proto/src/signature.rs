//! Version 4 signature packets and their subpackets.
//!
//! The hashed subpacket area is kept verbatim next to its parsed form: the
//! hash trailer must cover the octets as they appeared on the wire.

use std::fmt;

use bytes::Bytes;

use crate::{
    algorithm::{HashAlgorithm, PublicKeyAlgorithm, SignatureType},
    codec::body::BodyReader,
    error::ProtocolError,
    key_id::{Fingerprint, KeyFlags, KeyId, KeyIdentifier},
};

const CREATION_TIME: u8 = 2;
const EXPIRATION_TIME: u8 = 3;
const ISSUER: u8 = 16;
const KEY_FLAGS: u8 = 27;
const ISSUER_FINGERPRINT: u8 = 33;

/// A signature subpacket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subpacket {
    /// Critical bit. Unknown critical subpackets invalidate the signature.
    pub critical: bool,
    /// Parsed content.
    pub kind: SubpacketKind,
}

impl Subpacket {
    /// Non-critical subpacket.
    pub fn new(kind: SubpacketKind) -> Self {
        Self { critical: false, kind }
    }

    /// Critical subpacket.
    pub fn critical(kind: SubpacketKind) -> Self {
        Self { critical: true, kind }
    }

    fn tag(&self) -> u8 {
        match &self.kind {
            SubpacketKind::CreationTime(_) => CREATION_TIME,
            SubpacketKind::ExpirationTime(_) => EXPIRATION_TIME,
            SubpacketKind::Issuer(_) => ISSUER,
            SubpacketKind::KeyFlags(_) => KEY_FLAGS,
            SubpacketKind::IssuerFingerprint(_) => ISSUER_FINGERPRINT,
            SubpacketKind::Other { tag, .. } => *tag,
        }
    }
}

/// Subpacket content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubpacketKind {
    /// Signature creation time, seconds since the epoch.
    CreationTime(u32),
    /// Signature validity period in seconds after creation. Zero never expires.
    ExpirationTime(u32),
    /// Issuer key ID.
    Issuer(KeyId),
    /// Key usage flags.
    KeyFlags(KeyFlags),
    /// Issuer fingerprint.
    IssuerFingerprint(Fingerprint),
    /// Any other subpacket, kept opaque.
    Other {
        /// Subpacket type without the critical bit.
        tag: u8,
        /// Raw content.
        data: Bytes,
    },
}

/// Algorithm-specific signature values.
#[derive(Clone, PartialEq, Eq)]
pub enum SignatureMaterial {
    /// Native Ed25519 signature.
    Ed25519([u8; 64]),
    /// Any other algorithm, kept opaque.
    Opaque(Bytes),
}

impl fmt::Debug for SignatureMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519(_) => f.write_str("Ed25519(..)"),
            Self::Opaque(bytes) => write!(f, "Opaque({} bytes)", bytes.len()),
        }
    }
}

/// A version 4 signature packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// What the signature is over.
    pub signature_type: SignatureType,
    /// Signing key algorithm.
    pub public_key_algorithm: PublicKeyAlgorithm,
    /// Digest algorithm.
    pub hash_algorithm: HashAlgorithm,
    /// Parsed hashed subpackets.
    pub hashed_subpackets: Vec<Subpacket>,
    /// Parsed unhashed subpackets.
    pub unhashed_subpackets: Vec<Subpacket>,
    /// Leftmost two octets of the signed digest.
    pub digest_prefix: [u8; 2],
    /// Signature values.
    pub material: SignatureMaterial,
    hashed_area: Bytes,
}

impl Signature {
    /// Builds a signature, encoding the hashed area from `hashed_subpackets`.
    pub fn new(
        signature_type: SignatureType,
        public_key_algorithm: PublicKeyAlgorithm,
        hash_algorithm: HashAlgorithm,
        hashed_subpackets: Vec<Subpacket>,
        unhashed_subpackets: Vec<Subpacket>,
        digest_prefix: [u8; 2],
        material: SignatureMaterial,
    ) -> Self {
        let hashed_area = Bytes::from(encode_subpackets(&hashed_subpackets));
        Self {
            signature_type,
            public_key_algorithm,
            hash_algorithm,
            hashed_subpackets,
            unhashed_subpackets,
            digest_prefix,
            material,
            hashed_area,
        }
    }

    /// Hashed subpacket area exactly as it is signed.
    pub fn hashed_area(&self) -> &[u8] {
        &self.hashed_area
    }

    /// Octets hashed after the signed data.
    ///
    /// The version 4 trailer is the signature prefix up to and including the
    /// hashed area, followed by `0x04 0xFF` and the prefix length as a
    /// four-octet big-endian number.
    pub fn hash_trailer(&self) -> Vec<u8> {
        let area_len = u16::try_from(self.hashed_area.len()).unwrap_or(u16::MAX);
        let mut trailer = Vec::with_capacity(self.hashed_area.len() + 12);
        trailer.extend_from_slice(&[
            4,
            self.signature_type.into(),
            self.public_key_algorithm.into(),
            self.hash_algorithm.into(),
        ]);
        trailer.extend_from_slice(&area_len.to_be_bytes());
        trailer.extend_from_slice(&self.hashed_area);
        let hashed_len = 6 + u32::from(area_len);
        trailer.extend_from_slice(&[4, 0xFF]);
        trailer.extend_from_slice(&hashed_len.to_be_bytes());
        trailer
    }

    /// Creation time from the hashed area.
    pub fn creation_time(&self) -> Option<u32> {
        self.hashed_subpackets.iter().find_map(|sp| match sp.kind {
            SubpacketKind::CreationTime(t) => Some(t),
            _ => None,
        })
    }

    /// Validity period from the hashed area. `None` or zero never expires.
    pub fn expiration_time(&self) -> Option<u32> {
        self.hashed_subpackets.iter().find_map(|sp| match sp.kind {
            SubpacketKind::ExpirationTime(t) => Some(t),
            _ => None,
        })
    }

    /// Every issuer reference in either area, fingerprints first.
    pub fn issuers(&self) -> Vec<KeyIdentifier> {
        let all = || self.hashed_subpackets.iter().chain(&self.unhashed_subpackets);
        let fingerprints = all().filter_map(|sp| match sp.kind {
            SubpacketKind::IssuerFingerprint(fp) => Some(KeyIdentifier::Fingerprint(fp)),
            _ => None,
        });
        let key_ids = all().filter_map(|sp| match sp.kind {
            SubpacketKind::Issuer(id) => Some(KeyIdentifier::KeyId(id)),
            _ => None,
        });
        fingerprints.chain(key_ids).collect()
    }

    /// First critical hashed subpacket this crate cannot interpret.
    pub fn unknown_critical_subpacket(&self) -> Option<u8> {
        self.hashed_subpackets.iter().find_map(|sp| match sp.kind {
            SubpacketKind::Other { tag, .. } if sp.critical => Some(tag),
            _ => None,
        })
    }

    pub(crate) fn decode(mut reader: BodyReader) -> Result<Self, ProtocolError> {
        let version = reader.u8()?;
        if version != 4 {
            return Err(ProtocolError::UnsupportedVersion { packet: "signature", version });
        }
        let signature_type = reader.u8()?.into();
        let public_key_algorithm: PublicKeyAlgorithm = reader.u8()?.into();
        let hash_algorithm = reader.u8()?.into();

        let hashed_len = usize::from(reader.u16()?);
        let hashed_area = reader.take(hashed_len)?;
        let hashed_subpackets = decode_subpackets(hashed_area.clone())?;

        let unhashed_len = usize::from(reader.u16()?);
        let unhashed_subpackets = decode_subpackets(reader.take(unhashed_len)?)?;

        let digest_prefix = reader.array()?;
        let material = match public_key_algorithm {
            PublicKeyAlgorithm::Ed25519 => SignatureMaterial::Ed25519(reader.array()?),
            _ => SignatureMaterial::Opaque(reader.rest()),
        };

        Ok(Self {
            signature_type,
            public_key_algorithm,
            hash_algorithm,
            hashed_subpackets,
            unhashed_subpackets,
            digest_prefix,
            material,
            hashed_area,
        })
    }

    pub(crate) fn encode_body(&self, out: &mut Vec<u8>) {
        let unhashed = encode_subpackets(&self.unhashed_subpackets);
        out.extend_from_slice(&[
            4,
            self.signature_type.into(),
            self.public_key_algorithm.into(),
            self.hash_algorithm.into(),
        ]);
        push_u16_len(out, self.hashed_area.len());
        out.extend_from_slice(&self.hashed_area);
        push_u16_len(out, unhashed.len());
        out.extend_from_slice(&unhashed);
        out.extend_from_slice(&self.digest_prefix);
        match &self.material {
            SignatureMaterial::Ed25519(sig) => out.extend_from_slice(sig),
            SignatureMaterial::Opaque(bytes) => out.extend_from_slice(bytes),
        }
    }
}

fn push_u16_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&u16::try_from(len).unwrap_or(u16::MAX).to_be_bytes());
}

fn decode_subpackets(area: Bytes) -> Result<Vec<Subpacket>, ProtocolError> {
    let mut reader = BodyReader::new(area, "signature subpacket");
    let mut subpackets = Vec::new();
    while !reader.is_empty() {
        let first = reader.u8()?;
        let len = match first {
            0..=191 => usize::from(first),
            192..=254 => ((usize::from(first) - 192) << 8) + usize::from(reader.u8()?) + 192,
            255 => reader.u32()? as usize,
        };
        if len == 0 {
            return Err(ProtocolError::InvalidField {
                packet: "signature",
                field: "subpacket length",
            });
        }
        let raw_tag = reader.u8()?;
        let data = reader.take(len - 1)?;
        let kind = decode_kind(raw_tag & 0x7F, data);
        subpackets.push(Subpacket { critical: raw_tag & 0x80 != 0, kind });
    }
    Ok(subpackets)
}

fn decode_kind(tag: u8, data: Bytes) -> SubpacketKind {
    let as_u32 = |data: &Bytes| <[u8; 4]>::try_from(data.as_ref()).ok().map(u32::from_be_bytes);
    let parsed = match tag {
        CREATION_TIME => as_u32(&data).map(SubpacketKind::CreationTime),
        EXPIRATION_TIME => as_u32(&data).map(SubpacketKind::ExpirationTime),
        ISSUER => <[u8; 8]>::try_from(data.as_ref())
            .ok()
            .map(|id| SubpacketKind::Issuer(KeyId::new(id))),
        KEY_FLAGS => {
            data.first().map(|flags| SubpacketKind::KeyFlags(KeyFlags::from_bits_retain(*flags)))
        },
        ISSUER_FINGERPRINT => data
            .split_first()
            .and_then(|(version, fp)| Fingerprint::from_bytes(*version, fp))
            .map(SubpacketKind::IssuerFingerprint),
        _ => None,
    };
    parsed.unwrap_or(SubpacketKind::Other { tag, data })
}

fn encode_subpackets(subpackets: &[Subpacket]) -> Vec<u8> {
    let mut out = Vec::new();
    for subpacket in subpackets {
        let mut data = Vec::new();
        match &subpacket.kind {
            SubpacketKind::CreationTime(t) | SubpacketKind::ExpirationTime(t) => {
                data.extend_from_slice(&t.to_be_bytes());
            },
            SubpacketKind::Issuer(id) => data.extend_from_slice(id.as_bytes()),
            SubpacketKind::KeyFlags(flags) => data.push(flags.bits()),
            SubpacketKind::IssuerFingerprint(fp) => {
                data.push(fp.version());
                data.extend_from_slice(fp.as_bytes());
            },
            SubpacketKind::Other { data: raw, .. } => data.extend_from_slice(raw),
        }

        let len = data.len() + 1;
        if len < 192 {
            out.push(len as u8);
        } else if len < 8384 {
            let rest = len - 192;
            out.extend_from_slice(&[((rest >> 8) + 192) as u8, (rest & 0xFF) as u8]);
        } else {
            out.push(255);
            out.extend_from_slice(&u32::try_from(len).unwrap_or(u32::MAX).to_be_bytes());
        }
        let critical = if subpacket.critical { 0x80 } else { 0 };
        out.push(subpacket.tag() | critical);
        out.extend_from_slice(&data);
    }
    out
}
