//! Hash contexts and signature hashing.

use digest::Digest;
use ravel_proto::{HashAlgorithm, SignatureType, Unsupported};
use subtle::ConstantTimeEq;

use crate::error::CryptoError;

/// An incremental hash computation.
pub trait Hasher: Send {
    /// Algorithm of this context.
    fn algorithm(&self) -> HashAlgorithm;

    /// Feeds data.
    fn update(&mut self, data: &[u8]);

    /// Consumes the context and returns the digest.
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

struct DigestHasher<D> {
    algorithm: HashAlgorithm,
    digest: D,
}

impl<D: Digest + Send> Hasher for DigestHasher<D> {
    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.digest, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.digest.finalize().to_vec()
    }
}

fn boxed<D: Digest + Send + 'static>(algorithm: HashAlgorithm) -> Box<dyn Hasher> {
    Box::new(DigestHasher { algorithm, digest: D::new() })
}

/// Creates a hash context for `algorithm`.
pub fn hasher(algorithm: HashAlgorithm) -> Result<Box<dyn Hasher>, CryptoError> {
    let hasher = match algorithm {
        HashAlgorithm::Sha1 => boxed::<sha1::Sha1>(algorithm),
        HashAlgorithm::Sha224 => boxed::<sha2::Sha224>(algorithm),
        HashAlgorithm::Sha256 => boxed::<sha2::Sha256>(algorithm),
        HashAlgorithm::Sha384 => boxed::<sha2::Sha384>(algorithm),
        HashAlgorithm::Sha512 => boxed::<sha2::Sha512>(algorithm),
        other => return Err(CryptoError::Unsupported(Unsupported::Hash(other))),
    };
    Ok(hasher)
}

/// Compares two digests in constant time.
pub fn digest_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Hashes signed data the way its signature type requires.
///
/// Binary signatures hash octets as given. Text signatures hash the data
/// with every line ending converted to `CR LF`; a `CR` at the end of one
/// chunk and an `LF` at the start of the next are treated as one line
/// ending.
pub struct SignatureHasher {
    inner: Box<dyn Hasher>,
    text: bool,
    last_was_cr: bool,
}

impl SignatureHasher {
    /// Wraps a fresh hash context for a signature of `signature_type`.
    pub fn new(inner: Box<dyn Hasher>, signature_type: SignatureType) -> Self {
        Self { inner, text: signature_type == SignatureType::Text, last_was_cr: false }
    }

    /// Algorithm of the underlying context.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.inner.algorithm()
    }

    /// Feeds signed data.
    pub fn update(&mut self, data: &[u8]) {
        if !self.text {
            self.inner.update(data);
            return;
        }

        let mut start = 0;
        for (i, &byte) in data.iter().enumerate() {
            if byte == b'\n' && !self.last_was_cr {
                self.inner.update(&data[start..i]);
                self.inner.update(b"\r\n");
                start = i + 1;
            }
            self.last_was_cr = byte == b'\r';
        }
        self.inner.update(&data[start..]);
    }

    /// Hashes `trailer` and returns the final digest.
    pub fn finalize(mut self, trailer: &[u8]) -> Vec<u8> {
        self.inner.update(trailer);
        self.inner.finalize()
    }
}

impl std::fmt::Debug for SignatureHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureHasher")
            .field("algorithm", &self.inner.algorithm())
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}
