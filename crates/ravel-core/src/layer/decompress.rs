//! Compressed data expansion.
//!
//! Output is bounded: a layer that would expand beyond the configured limit
//! fails with [`Error::LimitExceeded`] without buffering more than one octet
//! past the limit.

use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};
use ravel_crypto::Zeroizing;
use ravel_proto::{CompressedData, CompressionAlgorithm, Unsupported};

use crate::error::Error;

/// Expands a compressed data packet.
pub fn decompress(packet: &CompressedData, limit: u64) -> Result<Zeroizing<Vec<u8>>, Error> {
    let body = &packet.body[..];
    match packet.algorithm {
        CompressionAlgorithm::Uncompressed => bounded(body, limit),
        CompressionAlgorithm::Zip => bounded(DeflateDecoder::new(body), limit),
        CompressionAlgorithm::Zlib => bounded(ZlibDecoder::new(body), limit),
        other => Err(Error::UnsupportedAlgorithm(Unsupported::Compression(other))),
    }
}

fn bounded(reader: impl Read, limit: u64) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut output = Zeroizing::new(Vec::new());
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut output)
        .map_err(Error::Decompression)?;
    if output.len() as u64 > limit {
        return Err(Error::LimitExceeded { limit });
    }
    Ok(output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use bytes::Bytes;
    use flate2::{
        Compression,
        write::{DeflateEncoder, ZlibEncoder},
    };

    use super::*;

    fn packet(algorithm: CompressionAlgorithm, body: Vec<u8>) -> CompressedData {
        CompressedData { algorithm, body: Bytes::from(body) }
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn zip_and_zlib_expand() {
        let zip = packet(CompressionAlgorithm::Zip, deflate(b"hello hello hello"));
        assert_eq!(decompress(&zip, 1024).unwrap().as_slice(), b"hello hello hello");

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"zlib").unwrap();
        let zlib = packet(CompressionAlgorithm::Zlib, encoder.finish().unwrap());
        assert_eq!(decompress(&zlib, 1024).unwrap().as_slice(), b"zlib");
    }

    #[test]
    fn expansion_beyond_limit_fails() {
        let bomb = packet(CompressionAlgorithm::Zip, deflate(&vec![0u8; 100_000]));
        assert!(matches!(decompress(&bomb, 4096), Err(Error::LimitExceeded { limit: 4096 })));
        assert_eq!(decompress(&bomb, 100_000).unwrap().len(), 100_000);
    }

    #[test]
    fn uncompressed_is_bounded_too() {
        let raw = packet(CompressionAlgorithm::Uncompressed, vec![1; 10]);
        assert!(matches!(decompress(&raw, 9), Err(Error::LimitExceeded { .. })));
    }

    #[test]
    fn corrupt_stream_is_a_decompression_error() {
        let corrupt = packet(CompressionAlgorithm::Zlib, vec![0xFF; 16]);
        assert!(matches!(decompress(&corrupt, 1024), Err(Error::Decompression(_))));
    }

    #[test]
    fn bzip2_is_unsupported() {
        let bzip2 = packet(CompressionAlgorithm::Bzip2, vec![]);
        assert!(matches!(
            decompress(&bzip2, 1024),
            Err(Error::UnsupportedAlgorithm(Unsupported::Compression(CompressionAlgorithm::Bzip2)))
        ));
    }
}
