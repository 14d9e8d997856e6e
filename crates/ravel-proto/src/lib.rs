//! OpenPGP packet model and codec.
//!
//! This crate is the structural vocabulary of the message consumer: typed
//! packets, algorithm identifiers, key identifiers, string-to-key specifiers
//! and a lazy codec that turns bytes into [`Packet`] values.
//!
//! # Design
//!
//! - **Parse, don't interpret**: Decoding checks framing and field layout
//!   only. Whether a packet may appear at a given position is decided by the
//!   grammar validator in `ravel-core`, and whether an algorithm is usable is
//!   decided when it is used.
//! - **Unknown identifiers survive parsing**: Algorithm enums carry an
//!   `Other(u8)` arm so unsupported algorithms are reported after structural
//!   validation, not as codec failures.
//! - **Zero-copy bodies**: Packet payloads are [`bytes::Bytes`] slices of the
//!   buffer they were read into.
//!
//! # Wire Format
//!
//! Framing follows RFC 9580 section 4.2: new-format headers with one, two,
//! five octet or partial body lengths, and old-format headers with one, two,
//! four octet or indeterminate lengths.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod algorithm;
pub mod codec;
pub mod error;
pub mod key_id;
pub mod packet;
pub mod s2k;
pub mod signature;

pub use algorithm::{
    AeadAlgorithm, CompressionAlgorithm, HashAlgorithm, LiteralFormat, PublicKeyAlgorithm,
    SignatureType, SymmetricAlgorithm, Unsupported,
};
pub use codec::{PacketList, PacketReader, PacketSource};
pub use error::ProtocolError;
pub use key_id::{Fingerprint, KeyFlags, KeyId, KeyIdentifier};
pub use packet::{
    CompressedData, IntegrityProtectedData, LiteralData, OnePassSignature, Packet,
    PassphraseEncryptedSessionKey, PublicKeyEncryptedSessionKey, SessionKeyMaterial,
    SymmetricallyEncryptedData, UnknownPacket,
};
pub use s2k::S2k;
pub use signature::{Signature, SignatureMaterial, Subpacket, SubpacketKind};
