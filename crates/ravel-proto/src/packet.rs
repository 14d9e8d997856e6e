//! Typed packets that may appear in an OpenPGP message.
//!
//! Each packet is immutable once decoded. Key material packets and other
//! tags that have no place in a message decode to [`Packet::Unknown`]; the
//! grammar validator decides what to do with them.

use std::fmt;

use bytes::Bytes;

use crate::{
    algorithm::{
        AeadAlgorithm, CompressionAlgorithm, HashAlgorithm, LiteralFormat, PublicKeyAlgorithm,
        SignatureType, SymmetricAlgorithm,
    },
    codec::body::BodyReader,
    error::ProtocolError,
    key_id::{Fingerprint, KeyId, KeyIdentifier},
    s2k::S2k,
    signature::Signature,
};

/// Packet tag values used by messages.
pub mod tag {
    /// Public-key encrypted session key.
    pub const PKESK: u8 = 1;
    /// Signature.
    pub const SIGNATURE: u8 = 2;
    /// Symmetric-key (passphrase) encrypted session key.
    pub const SKESK: u8 = 3;
    /// One-pass signature.
    pub const ONE_PASS_SIGNATURE: u8 = 4;
    /// Compressed data.
    pub const COMPRESSED_DATA: u8 = 8;
    /// Symmetrically encrypted data without integrity protection.
    pub const SYMMETRICALLY_ENCRYPTED_DATA: u8 = 9;
    /// Marker.
    pub const MARKER: u8 = 10;
    /// Literal data.
    pub const LITERAL_DATA: u8 = 11;
    /// Symmetrically encrypted and integrity protected data.
    pub const SEIPD: u8 = 18;
    /// Padding.
    pub const PADDING: u8 = 21;

    /// True for tags whose bodies may use partial lengths.
    pub const fn allows_partial_length(tag: u8) -> bool {
        matches!(tag, COMPRESSED_DATA | SYMMETRICALLY_ENCRYPTED_DATA | LITERAL_DATA | SEIPD)
    }

    /// True for tags in the non-critical range that must be skipped when
    /// unknown.
    pub const fn is_non_critical(tag: u8) -> bool {
        tag >= 40 && tag <= 63
    }
}

/// A decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Session key encrypted to a public key.
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    /// Signature.
    Signature(Signature),
    /// Session key encrypted with a passphrase.
    PassphraseEncryptedSessionKey(PassphraseEncryptedSessionKey),
    /// One-pass signature announcing a trailing signature.
    OnePassSignature(OnePassSignature),
    /// Compressed message.
    CompressedData(CompressedData),
    /// Encrypted message without integrity protection.
    SymmetricallyEncryptedData(SymmetricallyEncryptedData),
    /// Marker, ignored.
    Marker,
    /// Literal data.
    LiteralData(LiteralData),
    /// Encrypted and integrity protected message.
    IntegrityProtectedData(IntegrityProtectedData),
    /// Padding, ignored.
    Padding {
        /// Number of padding octets.
        length: usize,
    },
    /// Packet this codec does not interpret.
    Unknown(UnknownPacket),
}

impl Packet {
    /// Wire tag of this packet.
    pub fn tag(&self) -> u8 {
        match self {
            Self::PublicKeyEncryptedSessionKey(_) => tag::PKESK,
            Self::Signature(_) => tag::SIGNATURE,
            Self::PassphraseEncryptedSessionKey(_) => tag::SKESK,
            Self::OnePassSignature(_) => tag::ONE_PASS_SIGNATURE,
            Self::CompressedData(_) => tag::COMPRESSED_DATA,
            Self::SymmetricallyEncryptedData(_) => tag::SYMMETRICALLY_ENCRYPTED_DATA,
            Self::Marker => tag::MARKER,
            Self::LiteralData(_) => tag::LITERAL_DATA,
            Self::IntegrityProtectedData(_) => tag::SEIPD,
            Self::Padding { .. } => tag::PADDING,
            Self::Unknown(packet) => packet.tag,
        }
    }

    /// Decodes a packet body for `tag`.
    pub fn decode(tag: u8, body: Bytes) -> Result<Self, ProtocolError> {
        let packet = match tag {
            tag::PKESK => Self::PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey::decode(
                BodyReader::new(body, "PKESK"),
            )?),
            tag::SIGNATURE => {
                Self::Signature(Signature::decode(BodyReader::new(body, "signature"))?)
            },
            tag::SKESK => Self::PassphraseEncryptedSessionKey(PassphraseEncryptedSessionKey::decode(
                BodyReader::new(body, "SKESK"),
            )?),
            tag::ONE_PASS_SIGNATURE => Self::OnePassSignature(OnePassSignature::decode(
                BodyReader::new(body, "one-pass signature"),
            )?),
            tag::COMPRESSED_DATA => {
                let mut reader = BodyReader::new(body, "compressed data");
                Self::CompressedData(CompressedData {
                    algorithm: reader.u8()?.into(),
                    body: reader.rest(),
                })
            },
            tag::SYMMETRICALLY_ENCRYPTED_DATA => {
                Self::SymmetricallyEncryptedData(SymmetricallyEncryptedData { body })
            },
            tag::MARKER => {
                if body.as_ref() != b"PGP" {
                    return Err(ProtocolError::InvalidField { packet: "marker", field: "body" });
                }
                Self::Marker
            },
            tag::LITERAL_DATA => {
                Self::LiteralData(LiteralData::decode(BodyReader::new(body, "literal data"))?)
            },
            tag::SEIPD => Self::IntegrityProtectedData(IntegrityProtectedData::decode(
                BodyReader::new(body, "SEIPD"),
            )?),
            tag::PADDING => Self::Padding { length: body.len() },
            tag => Self::Unknown(UnknownPacket { tag, body }),
        };
        Ok(packet)
    }
}

/// Session key encrypted to a recipient's public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEncryptedSessionKey {
    /// Packet version, 3 or 6.
    pub version: u8,
    /// Intended recipient. `None` for an anonymous recipient.
    pub recipient: Option<KeyIdentifier>,
    /// Recipient key algorithm.
    pub algorithm: PublicKeyAlgorithm,
    /// Algorithm-specific encrypted key.
    pub material: SessionKeyMaterial,
}

/// Algorithm-specific part of a public-key encrypted session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionKeyMaterial {
    /// X25519 ephemeral key and AES key-wrapped session key.
    X25519 {
        /// Sender's ephemeral public key.
        ephemeral: [u8; 32],
        /// Cleartext cipher of the session key, version 3 only.
        symmetric_algorithm: Option<SymmetricAlgorithm>,
        /// Wrapped session key.
        wrapped_key: Bytes,
    },
    /// Any other algorithm, kept opaque.
    Opaque(Bytes),
}

impl PublicKeyEncryptedSessionKey {
    fn decode(mut reader: BodyReader) -> Result<Self, ProtocolError> {
        let version = reader.u8()?;
        let recipient = match version {
            3 => {
                let id = KeyId::new(reader.array()?);
                (!id.is_wildcard()).then_some(KeyIdentifier::KeyId(id))
            },
            6 => match usize::from(reader.u8()?) {
                0 => None,
                len => {
                    let key_version = reader.u8()?;
                    let fingerprint = reader.take(len - 1)?;
                    let fingerprint = Fingerprint::from_bytes(key_version, &fingerprint).ok_or(
                        ProtocolError::InvalidField { packet: "PKESK", field: "recipient" },
                    )?;
                    Some(KeyIdentifier::Fingerprint(fingerprint))
                },
            },
            version => return Err(ProtocolError::UnsupportedVersion { packet: "PKESK", version }),
        };
        let algorithm: PublicKeyAlgorithm = reader.u8()?.into();
        let material = match algorithm {
            PublicKeyAlgorithm::X25519 => {
                let ephemeral = reader.array()?;
                let len = usize::from(reader.u8()?);
                let symmetric_algorithm =
                    if version == 3 { Some(SymmetricAlgorithm::from(reader.u8()?)) } else { None };
                let wrapped_len = if version == 3 { len.checked_sub(1) } else { Some(len) };
                let wrapped_len = wrapped_len.ok_or(ProtocolError::InvalidField {
                    packet: "PKESK",
                    field: "wrapped key length",
                })?;
                SessionKeyMaterial::X25519 {
                    ephemeral,
                    symmetric_algorithm,
                    wrapped_key: reader.take(wrapped_len)?,
                }
            },
            _ => SessionKeyMaterial::Opaque(reader.rest()),
        };
        Ok(Self { version, recipient, algorithm, material })
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(self.version);
        if self.version == 3 {
            let id = self.recipient.map_or(KeyId::WILDCARD, |r| r.key_id());
            out.extend_from_slice(id.as_bytes());
        } else {
            match self.recipient {
                Some(KeyIdentifier::Fingerprint(fp)) => {
                    out.push((fp.as_bytes().len() + 1) as u8);
                    out.push(fp.version());
                    out.extend_from_slice(fp.as_bytes());
                },
                _ => out.push(0),
            }
        }
        out.push(self.algorithm.into());
        match &self.material {
            SessionKeyMaterial::X25519 { ephemeral, symmetric_algorithm, wrapped_key } => {
                out.extend_from_slice(ephemeral);
                let prefix = usize::from(symmetric_algorithm.is_some());
                out.push((wrapped_key.len() + prefix) as u8);
                if let Some(algorithm) = symmetric_algorithm {
                    out.push((*algorithm).into());
                }
                out.extend_from_slice(wrapped_key);
            },
            SessionKeyMaterial::Opaque(bytes) => out.extend_from_slice(bytes),
        }
    }
}

/// Session key encrypted with a passphrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassphraseEncryptedSessionKey {
    /// Version 4, used with SEIPD version 1.
    V4 {
        /// Cipher for the key-encryption key and, absent an encrypted key,
        /// for the data.
        symmetric_algorithm: SymmetricAlgorithm,
        /// Passphrase derivation.
        s2k: S2k,
        /// CFB-encrypted `algorithm || session key`. When absent the derived
        /// key is the session key.
        encrypted_key: Option<Bytes>,
    },
    /// Version 6, used with SEIPD version 2.
    V6 {
        /// Cipher of the session key.
        symmetric_algorithm: SymmetricAlgorithm,
        /// AEAD mode protecting the session key.
        aead_algorithm: AeadAlgorithm,
        /// Passphrase derivation.
        s2k: S2k,
        /// AEAD nonce.
        iv: Bytes,
        /// Encrypted session key followed by the authentication tag.
        encrypted_key: Bytes,
    },
}

impl PassphraseEncryptedSessionKey {
    /// Passphrase derivation of either version.
    pub fn s2k(&self) -> &S2k {
        match self {
            Self::V4 { s2k, .. } | Self::V6 { s2k, .. } => s2k,
        }
    }

    /// Packet version.
    pub fn version(&self) -> u8 {
        match self {
            Self::V4 { .. } => 4,
            Self::V6 { .. } => 6,
        }
    }

    fn decode(mut reader: BodyReader) -> Result<Self, ProtocolError> {
        match reader.u8()? {
            4 => {
                let symmetric_algorithm = reader.u8()?.into();
                let s2k = S2k::decode(&mut reader)?;
                let rest = reader.rest();
                Ok(Self::V4 {
                    symmetric_algorithm,
                    s2k,
                    encrypted_key: (!rest.is_empty()).then_some(rest),
                })
            },
            6 => {
                let field_len = usize::from(reader.u8()?);
                let symmetric_algorithm = reader.u8()?.into();
                let aead_algorithm = reader.u8()?.into();
                let s2k_len = usize::from(reader.u8()?);
                let mut s2k_reader = BodyReader::new(reader.take(s2k_len)?, "SKESK S2K");
                let s2k = S2k::decode(&mut s2k_reader)?;
                let iv_len = field_len.checked_sub(3 + s2k_len).ok_or(
                    ProtocolError::InvalidField { packet: "SKESK", field: "field count" },
                )?;
                let iv = reader.take(iv_len)?;
                let encrypted_key = reader.rest();
                Ok(Self::V6 { symmetric_algorithm, aead_algorithm, s2k, iv, encrypted_key })
            },
            version => Err(ProtocolError::UnsupportedVersion { packet: "SKESK", version }),
        }
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        match self {
            Self::V4 { symmetric_algorithm, s2k, encrypted_key } => {
                out.extend_from_slice(&[4, (*symmetric_algorithm).into()]);
                s2k.encode(out);
                if let Some(key) = encrypted_key {
                    out.extend_from_slice(key);
                }
            },
            Self::V6 { symmetric_algorithm, aead_algorithm, s2k, iv, encrypted_key } => {
                let mut s2k_bytes = Vec::new();
                s2k.encode(&mut s2k_bytes);
                out.extend_from_slice(&[
                    6,
                    (3 + s2k_bytes.len() + iv.len()) as u8,
                    (*symmetric_algorithm).into(),
                    (*aead_algorithm).into(),
                    s2k_bytes.len() as u8,
                ]);
                out.extend_from_slice(&s2k_bytes);
                out.extend_from_slice(iv);
                out.extend_from_slice(encrypted_key);
            },
        }
    }
}

/// One-pass signature (version 3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnePassSignature {
    /// Type of the announced signature.
    pub signature_type: SignatureType,
    /// Digest algorithm of the announced signature.
    pub hash_algorithm: HashAlgorithm,
    /// Signing key algorithm.
    pub public_key_algorithm: PublicKeyAlgorithm,
    /// Issuer of the announced signature.
    pub issuer: KeyId,
    /// Nesting flag. `false` means another one-pass signature over the same
    /// data follows.
    pub last: bool,
}

impl OnePassSignature {
    fn decode(mut reader: BodyReader) -> Result<Self, ProtocolError> {
        let version = reader.u8()?;
        if version != 3 {
            return Err(ProtocolError::UnsupportedVersion { packet: "one-pass signature", version });
        }
        Ok(Self {
            signature_type: reader.u8()?.into(),
            hash_algorithm: reader.u8()?.into(),
            public_key_algorithm: reader.u8()?.into(),
            issuer: KeyId::new(reader.array()?),
            last: reader.u8()? != 0,
        })
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[
            3,
            self.signature_type.into(),
            self.hash_algorithm.into(),
            self.public_key_algorithm.into(),
        ]);
        out.extend_from_slice(self.issuer.as_bytes());
        out.push(u8::from(self.last));
    }
}

/// Compressed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedData {
    /// Compression algorithm.
    pub algorithm: CompressionAlgorithm,
    /// Compressed packet stream.
    pub body: Bytes,
}

/// Encrypted data without integrity protection (tag 9).
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricallyEncryptedData {
    /// Ciphertext.
    pub body: Bytes,
}

impl fmt::Debug for SymmetricallyEncryptedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricallyEncryptedData").field("body_len", &self.body.len()).finish()
    }
}

/// Encrypted and integrity protected data (tag 18).
#[derive(Clone, PartialEq, Eq)]
pub enum IntegrityProtectedData {
    /// CFB encryption with a trailing SHA-1 modification detection code.
    V1 {
        /// Ciphertext.
        body: Bytes,
    },
    /// Chunked AEAD encryption.
    V2 {
        /// Cipher.
        symmetric_algorithm: SymmetricAlgorithm,
        /// AEAD mode.
        aead_algorithm: AeadAlgorithm,
        /// Chunk size octet `c`; chunks hold `2^(c + 6)` octets.
        chunk_size: u8,
        /// HKDF salt.
        salt: [u8; 32],
        /// Encrypted chunks followed by the final tag.
        body: Bytes,
    },
}

impl IntegrityProtectedData {
    /// Largest chunk size octet allowed by RFC 9580.
    pub const MAX_CHUNK_SIZE: u8 = 16;

    /// Packet version.
    pub fn version(&self) -> u8 {
        match self {
            Self::V1 { .. } => 1,
            Self::V2 { .. } => 2,
        }
    }

    /// Plaintext octets per chunk for a chunk size octet.
    pub fn chunk_length(chunk_size: u8) -> usize {
        1usize << (u32::from(chunk_size) + 6)
    }

    fn decode(mut reader: BodyReader) -> Result<Self, ProtocolError> {
        match reader.u8()? {
            1 => Ok(Self::V1 { body: reader.rest() }),
            2 => {
                let symmetric_algorithm = reader.u8()?.into();
                let aead_algorithm = reader.u8()?.into();
                let chunk_size = reader.u8()?;
                if chunk_size > Self::MAX_CHUNK_SIZE {
                    let field = "chunk size";
                    return Err(ProtocolError::InvalidField { packet: "SEIPD", field });
                }
                let salt = reader.array()?;
                let body = reader.rest();
                Ok(Self::V2 { symmetric_algorithm, aead_algorithm, chunk_size, salt, body })
            },
            version => Err(ProtocolError::UnsupportedVersion { packet: "SEIPD", version }),
        }
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        match self {
            Self::V1 { body } => {
                out.push(1);
                out.extend_from_slice(body);
            },
            Self::V2 { symmetric_algorithm, aead_algorithm, chunk_size, salt, body } => {
                out.extend_from_slice(&[
                    2,
                    (*symmetric_algorithm).into(),
                    (*aead_algorithm).into(),
                    *chunk_size,
                ]);
                out.extend_from_slice(salt);
                out.extend_from_slice(body);
            },
        }
    }
}

impl fmt::Debug for IntegrityProtectedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 { body } => f.debug_struct("V1").field("body_len", &body.len()).finish(),
            Self::V2 { symmetric_algorithm, aead_algorithm, chunk_size, body, .. } => f
                .debug_struct("V2")
                .field("symmetric_algorithm", symmetric_algorithm)
                .field("aead_algorithm", aead_algorithm)
                .field("chunk_size", chunk_size)
                .field("body_len", &body.len())
                .finish(),
        }
    }
}

/// Literal data.
///
/// # Security
///
/// - **Debug Redaction**: The `Debug` impl prints the body length only, so
///   decrypted plaintext does not end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct LiteralData {
    /// Data format hint.
    pub format: LiteralFormat,
    /// File name hint, not necessarily UTF-8.
    pub filename: Bytes,
    /// Modification time, seconds since the epoch.
    pub modification_time: u32,
    /// Payload.
    pub body: Bytes,
}

impl LiteralData {
    fn decode(mut reader: BodyReader) -> Result<Self, ProtocolError> {
        let format = reader.u8()?.into();
        let name_len = usize::from(reader.u8()?);
        let filename = reader.take(name_len)?;
        let modification_time = reader.u32()?;
        Ok(Self { format, filename, modification_time, body: reader.rest() })
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        out.push(self.format.into());
        let name = &self.filename[..self.filename.len().min(255)];
        out.push(name.len() as u8);
        out.extend_from_slice(name);
        out.extend_from_slice(&self.modification_time.to_be_bytes());
        out.extend_from_slice(&self.body);
    }
}

impl fmt::Debug for LiteralData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiteralData")
            .field("format", &self.format)
            .field("filename", &String::from_utf8_lossy(&self.filename))
            .field("modification_time", &self.modification_time)
            .field("body", &format!("<{} bytes>", self.body.len()))
            .finish()
    }
}

/// Packet with a tag this codec does not interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPacket {
    /// Packet tag.
    pub tag: u8,
    /// Raw body.
    pub body: Bytes,
}

pub(crate) fn encode_body(packet: &Packet, out: &mut Vec<u8>) {
    match packet {
        Packet::PublicKeyEncryptedSessionKey(p) => p.encode_body(out),
        Packet::Signature(p) => p.encode_body(out),
        Packet::PassphraseEncryptedSessionKey(p) => p.encode_body(out),
        Packet::OnePassSignature(p) => p.encode_body(out),
        Packet::CompressedData(p) => {
            out.push(p.algorithm.into());
            out.extend_from_slice(&p.body);
        },
        Packet::SymmetricallyEncryptedData(p) => out.extend_from_slice(&p.body),
        Packet::Marker => out.extend_from_slice(b"PGP"),
        Packet::LiteralData(p) => p.encode_body(out),
        Packet::IntegrityProtectedData(p) => p.encode_body(out),
        Packet::Padding { length } => out.resize(out.len() + length, 0),
        Packet::Unknown(p) => out.extend_from_slice(&p.body),
    }
}
