//! Layer transforms: decryption and decompression.
//!
//! Each transform turns one container packet into the bytes of the nested
//! message. [`Plaintext`] wraps the result so that the nested packet reader
//! reads from a buffer that is wiped when the layer closes.

pub mod decompress;
pub mod decrypt;

use std::fmt;

use ravel_crypto::Zeroizing;

/// Zeroizing byte buffer readable through `std::io::Cursor`.
pub struct Plaintext(Zeroizing<Vec<u8>>);

impl Plaintext {
    /// Wraps a decrypted or decompressed buffer.
    pub fn new(bytes: Zeroizing<Vec<u8>>) -> Self {
        Self(bytes)
    }

    /// Length in octets.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for an empty layer.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plaintext").field("len", &self.len()).finish_non_exhaustive()
    }
}

impl AsRef<[u8]> for Plaintext {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_shows_length_not_contents() {
        let plaintext = Plaintext::new(Zeroizing::new(b"attack at dawn".to_vec()));
        let shown = format!("{plaintext:?}");
        assert_eq!(shown, "Plaintext { len: 14, .. }");
        assert!(!shown.contains("dawn"));
    }
}
