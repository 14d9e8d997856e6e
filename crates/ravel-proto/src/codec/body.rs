//! Checked cursor over a packet body.

use bytes::{Buf, Bytes};

use crate::error::ProtocolError;

/// Reads fields from a packet body, failing with `Truncated` instead of
/// panicking when the body is too short.
pub(crate) struct BodyReader {
    buf: Bytes,
    what: &'static str,
}

impl BodyReader {
    pub(crate) fn new(buf: Bytes, what: &'static str) -> Self {
        Self { buf, what }
    }

    fn need(&self, len: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() < len {
            return Err(ProtocolError::Truncated { what: self.what });
        }
        Ok(())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ProtocolError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ProtocolError> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ProtocolError> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        self.need(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<Bytes, ProtocolError> {
        self.need(len)?;
        Ok(self.buf.split_to(len))
    }

    pub(crate) fn rest(&mut self) -> Bytes {
        std::mem::take(&mut self.buf)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.remaining()
    }
}
