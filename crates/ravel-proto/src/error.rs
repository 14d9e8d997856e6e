//! Codec error types.

use thiserror::Error;

/// Errors produced while framing or decoding packets.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Input ended in the middle of a header, length or field.
    #[error("truncated {what}")]
    Truncated {
        /// The structure that was cut short.
        what: &'static str,
    },

    /// Packet header is not a valid OpenPGP header.
    #[error("invalid packet header: {reason}")]
    InvalidHeader {
        /// Description of the header defect.
        reason: &'static str,
    },

    /// A field holds a value the packet layout does not allow.
    #[error("invalid {field} in {packet} packet")]
    InvalidField {
        /// Packet being decoded.
        packet: &'static str,
        /// Offending field.
        field: &'static str,
    },

    /// Packet version this codec does not understand.
    #[error("unsupported {packet} packet version {version}")]
    UnsupportedVersion {
        /// Packet being decoded.
        packet: &'static str,
        /// Version octet found on the wire.
        version: u8,
    },

    /// Packet body larger than the configured limit.
    #[error("packet body of {length} bytes exceeds limit of {limit} bytes")]
    PacketTooLarge {
        /// Declared or accumulated body length.
        length: u64,
        /// Configured maximum.
        limit: usize,
    },

    /// Underlying reader failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
