//! Packet header framing.

use std::io::{self, Read};

use crate::{error::ProtocolError, packet::tag};

/// How the body following a header is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyLength {
    /// Exactly this many octets.
    Definite(u32),
    /// This many octets, then another length.
    Partial(u32),
    /// Everything up to the end of input (old format only).
    Indeterminate,
}

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub tag: u8,
    pub length: BodyLength,
}

/// Reads one octet, `None` at a clean end of input.
pub(crate) fn read_octet<R: Read>(reader: &mut R) -> io::Result<Option<u8>> {
    let mut octet = [0u8; 1];
    loop {
        match reader.read(&mut octet) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(octet[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
            Err(e) => return Err(e),
        }
    }
}

fn required<R: Read>(reader: &mut R, what: &'static str) -> Result<u8, ProtocolError> {
    read_octet(reader)?.ok_or(ProtocolError::Truncated { what })
}

fn read_be<R: Read>(reader: &mut R, octets: usize) -> Result<u32, ProtocolError> {
    let mut value = 0u32;
    for _ in 0..octets {
        value = (value << 8) | u32::from(required(reader, "packet length")?);
    }
    Ok(value)
}

/// Reads a new-format length, including partial lengths.
pub(crate) fn read_new_length<R: Read>(reader: &mut R) -> Result<BodyLength, ProtocolError> {
    let first = required(reader, "packet length")?;
    let length = match first {
        0..=191 => BodyLength::Definite(u32::from(first)),
        192..=223 => {
            let second = required(reader, "packet length")?;
            BodyLength::Definite(((u32::from(first) - 192) << 8) + u32::from(second) + 192)
        },
        255 => BodyLength::Definite(read_be(reader, 4)?),
        _ => BodyLength::Partial(1 << (first & 0x1F)),
    };
    Ok(length)
}

/// Reads a header, `None` if the input ends before its first octet.
pub(crate) fn read_header<R: Read>(reader: &mut R) -> Result<Option<Header>, ProtocolError> {
    let Some(first) = read_octet(reader)? else {
        return Ok(None);
    };
    if first & 0x80 == 0 {
        return Err(ProtocolError::InvalidHeader { reason: "high bit of tag octet is clear" });
    }

    let header = if first & 0x40 != 0 {
        let tag = first & 0x3F;
        let length = read_new_length(reader)?;
        if matches!(length, BodyLength::Partial(_)) && !tag::allows_partial_length(tag) {
            return Err(ProtocolError::InvalidHeader {
                reason: "partial length on a packet that does not allow it",
            });
        }
        Header { tag, length }
    } else {
        let tag = (first >> 2) & 0x0F;
        let length = match first & 0x03 {
            0 => BodyLength::Definite(read_be(reader, 1)?),
            1 => BodyLength::Definite(read_be(reader, 2)?),
            2 => BodyLength::Definite(read_be(reader, 4)?),
            _ => BodyLength::Indeterminate,
        };
        Header { tag, length }
    };

    if header.tag == 0 {
        return Err(ProtocolError::InvalidHeader { reason: "reserved tag 0" });
    }
    Ok(Some(header))
}

/// Appends a new-format header with a definite length.
///
/// Bodies longer than a five-octet length can state are refused and nothing
/// is written.
pub(crate) fn write_header(out: &mut Vec<u8>, tag: u8, len: usize) -> Result<(), ProtocolError> {
    let definite = u32::try_from(len).map_err(|_| ProtocolError::PacketTooLarge {
        length: len as u64,
        limit: u32::MAX as usize,
    })?;
    out.push(0xC0 | tag);
    if len < 192 {
        out.push(len as u8);
    } else if len < 8384 {
        let rest = len - 192;
        out.push(((rest >> 8) + 192) as u8);
        out.push((rest & 0xFF) as u8);
    } else {
        out.push(255);
        out.extend_from_slice(&definite.to_be_bytes());
    }
    Ok(())
}
