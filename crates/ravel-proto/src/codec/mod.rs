//! Lazy packet decoding and packet encoding.
//!
//! [`PacketReader`] pulls one packet at a time from any [`Read`], so a
//! compressed or decrypted layer can be parsed while it is produced.
//! [`PacketSource`] is the seam the message consumer reads from; it is also
//! implemented by [`PacketList`] for already-typed packets.
//!
//! # Invariants
//!
//! - A body never exceeds `max_body_length`, whatever the framing claims
//! - A clean end of input before a header is `Ok(None)`; an end of input
//!   inside a header or body is `Truncated`

pub(crate) mod body;
mod header;

use std::{
    collections::VecDeque,
    io::{self, Read},
};

use bytes::Bytes;

use self::header::{BodyLength, read_header, read_new_length, write_header};
use crate::{
    error::ProtocolError,
    packet::{Packet, encode_body},
};

/// Anything that yields typed packets in order.
pub trait PacketSource {
    /// Next packet, or `None` at the end of the sequence.
    fn next_packet(&mut self) -> Result<Option<Packet>, ProtocolError>;
}

/// Decodes packets lazily from a byte stream.
pub struct PacketReader<R> {
    inner: R,
    max_body_length: usize,
}

impl<R: Read> PacketReader<R> {
    /// Default bound on a single packet body.
    pub const DEFAULT_MAX_BODY_LENGTH: usize = 512 * 1024 * 1024;

    /// Creates a reader with the default body limit.
    pub fn new(inner: R) -> Self {
        Self { inner, max_body_length: Self::DEFAULT_MAX_BODY_LENGTH }
    }

    /// Replaces the body limit.
    #[must_use]
    pub fn with_max_body_length(mut self, max_body_length: usize) -> Self {
        self.max_body_length = max_body_length;
        self
    }

    /// Gives back the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn too_large(&self, length: u64) -> ProtocolError {
        ProtocolError::PacketTooLarge { length, limit: self.max_body_length }
    }

    fn read_chunk(&mut self, body: &mut Vec<u8>, len: u32) -> Result<(), ProtocolError> {
        let total = body.len() as u64 + u64::from(len);
        if total > self.max_body_length as u64 {
            return Err(self.too_large(total));
        }
        let start = body.len();
        body.resize(start + len as usize, 0);
        self.inner.read_exact(&mut body[start..]).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ProtocolError::Truncated { what: "packet body" },
            _ => ProtocolError::Io(e),
        })
    }

    fn read_body(&mut self, length: BodyLength) -> Result<Bytes, ProtocolError> {
        let mut body = Vec::new();
        match length {
            BodyLength::Definite(len) => self.read_chunk(&mut body, len)?,
            BodyLength::Partial(first) => {
                let mut next = BodyLength::Partial(first);
                while let BodyLength::Partial(len) = next {
                    self.read_chunk(&mut body, len)?;
                    next = read_new_length(&mut self.inner)?;
                }
                match next {
                    BodyLength::Definite(len) => self.read_chunk(&mut body, len)?,
                    BodyLength::Partial(_) | BodyLength::Indeterminate => {},
                }
            },
            BodyLength::Indeterminate => {
                let limit = self.max_body_length as u64;
                (&mut self.inner).take(limit + 1).read_to_end(&mut body)?;
                if body.len() as u64 > limit {
                    return Err(self.too_large(body.len() as u64));
                }
            },
        }
        Ok(Bytes::from(body))
    }
}

impl<R: Read> PacketSource for PacketReader<R> {
    fn next_packet(&mut self) -> Result<Option<Packet>, ProtocolError> {
        let Some(header) = read_header(&mut self.inner)? else {
            return Ok(None);
        };
        let body = self.read_body(header.length)?;
        Packet::decode(header.tag, body).map(Some)
    }
}

impl<R: Read> Iterator for PacketReader<R> {
    type Item = Result<Packet, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}

/// In-memory packet sequence.
#[derive(Debug, Clone, Default)]
pub struct PacketList {
    packets: VecDeque<Packet>,
}

impl PacketList {
    /// Wraps packets in order.
    pub fn new(packets: impl IntoIterator<Item = Packet>) -> Self {
        Self { packets: packets.into_iter().collect() }
    }

    /// Number of packets not yet consumed.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// True when every packet has been consumed.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

impl PacketSource for PacketList {
    fn next_packet(&mut self) -> Result<Option<Packet>, ProtocolError> {
        Ok(self.packets.pop_front())
    }
}

impl Packet {
    /// Appends this packet with a new-format header.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::PacketTooLarge`] if the body does not fit a
    /// four-octet length; `out` is left untouched.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), ProtocolError> {
        let mut body = Vec::new();
        encode_body(self, &mut body);
        write_header(out, self.tag(), body.len())?;
        out.extend_from_slice(&body);
        Ok(())
    }

    /// Encodes this packet into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }
}

/// Encodes a packet sequence.
pub fn encode_all<'a>(
    packets: impl IntoIterator<Item = &'a Packet>,
) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::new();
    for packet in packets {
        packet.encode(&mut out)?;
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::*;
    use crate::{
        algorithm::{CompressionAlgorithm, LiteralFormat},
        packet::{CompressedData, LiteralData},
    };

    fn literal(body: &[u8]) -> Packet {
        Packet::LiteralData(LiteralData {
            format: LiteralFormat::Binary,
            filename: Bytes::from_static(b"msg.txt"),
            modification_time: 1_700_000_000,
            body: Bytes::copy_from_slice(body),
        })
    }

    fn read_all(bytes: &[u8]) -> Result<Vec<Packet>, ProtocolError> {
        PacketReader::new(bytes).collect()
    }

    #[test]
    fn reads_sequence_in_order() {
        let packets = vec![
            Packet::Marker,
            Packet::CompressedData(CompressedData {
                algorithm: CompressionAlgorithm::Zlib,
                body: Bytes::from_static(b"\x78\x9c"),
            }),
            literal(b"hello"),
        ];
        let bytes = encode_all(&packets).unwrap();
        assert_eq!(read_all(&bytes).ok(), Some(packets));
    }

    #[test]
    fn partial_body_lengths_are_joined() {
        // Literal packet split as 512 octets (partial 0xE9) then a final 7.
        let mut body = vec![b'b', 0, 0, 0, 0, 0];
        body.extend(std::iter::repeat_n(b'x', 513));
        let mut bytes = vec![0xCB, 0xE9];
        bytes.extend_from_slice(&body[..512]);
        bytes.push(7);
        bytes.extend_from_slice(&body[512..]);

        let packets = read_all(&bytes).ok();
        let Some([Packet::LiteralData(literal)]) = packets.as_deref() else {
            unreachable!("expected one literal packet, got {packets:?}");
        };
        assert_eq!(literal.body.len(), 513);
    }

    #[test]
    fn old_format_indeterminate_reads_to_end() {
        let bytes = hex!("af 62 00 00000000 616263");
        let packets = read_all(&bytes).ok();
        let Some([Packet::LiteralData(literal)]) = packets.as_deref() else {
            unreachable!("expected one literal packet, got {packets:?}");
        };
        assert_eq!(literal.body.as_ref(), b"abc");
    }

    #[test]
    fn body_limit_applies_before_allocation() {
        let bytes = hex!("cb ff 7f ff ff ff");
        let result = PacketReader::new(&bytes[..]).with_max_body_length(1024).next_packet();
        assert!(matches!(result, Err(ProtocolError::PacketTooLarge { limit: 1024, .. })));
    }

    #[test]
    fn truncated_body_is_reported() {
        let bytes = hex!("cb 0a 62 00");
        assert!(matches!(read_all(&bytes), Err(ProtocolError::Truncated { what: "packet body" })));
    }

    proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let mut reader = PacketReader::new(&bytes[..]).with_max_body_length(4096);
            for _ in 0..64 {
                match reader.next_packet() {
                    Ok(Some(_)) => {},
                    Ok(None) | Err(_) => break,
                }
            }
        }

        #[test]
        fn literal_bodies_survive_framing(body in prop::collection::vec(any::<u8>(), 0..10_000)) {
            let bytes = literal(&body).to_bytes().unwrap();
            let decoded = read_all(&bytes).ok();
            prop_assert_eq!(decoded, Some(vec![literal(&body)]));
        }
    }
}
