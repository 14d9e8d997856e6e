//! Integrity-protected decryption.
//!
//! # Security Properties
//!
//! - **Release after authentication**: The whole layer is decrypted into a
//!   zeroizing buffer and handed out only after the MDC or every AEAD tag,
//!   including the final one, verified.
//! - **Constant-time MDC**: The SHA-1 modification detection code is compared
//!   with [`ravel_crypto::digest_eq`].
//! - **Key lifetime**: [`decrypt`] takes the session key by value; it is
//!   wiped when the function returns, on success and on failure.

use ravel_crypto::{CryptoBackend, CryptoError, SessionKey, Zeroizing, digest_eq};
use ravel_proto::{
    AeadAlgorithm, HashAlgorithm, IntegrityProtectedData, SymmetricAlgorithm, Unsupported,
};

use crate::error::Error;

/// Modification detection code packet header: tag 19, length 20.
const MDC_HEADER: [u8; 2] = [0xD3, 0x14];
const MDC_LEN: usize = 22;

fn block_size(algorithm: SymmetricAlgorithm) -> Result<usize, Error> {
    algorithm.block_size().ok_or(Error::UnsupportedAlgorithm(Unsupported::Symmetric(algorithm)))
}

fn integrity(err: CryptoError, reason: &'static str) -> Error {
    match err {
        CryptoError::AuthenticationFailed => Error::IntegrityCheckFailed { reason },
        other => Error::from(other),
    }
}

/// Decrypts and authenticates an encrypted data packet.
///
/// `session_key` must carry its cipher.
pub fn decrypt(
    backend: &dyn CryptoBackend,
    data: &IntegrityProtectedData,
    session_key: SessionKey,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let algorithm = session_key.algorithm().ok_or(Error::Crypto(
        CryptoError::InvalidKeyMaterial { reason: "session key without cipher" },
    ))?;

    match data {
        IntegrityProtectedData::V1 { body } => decrypt_v1(backend, algorithm, &session_key, body),
        IntegrityProtectedData::V2 { .. } => {
            let aead = AeadLayer::new(backend, data, session_key.as_bytes())?;
            aead.decrypt(backend)
        },
    }
}

fn decrypt_v1(
    backend: &dyn CryptoBackend,
    algorithm: SymmetricAlgorithm,
    session_key: &SessionKey,
    body: &[u8],
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let block = block_size(algorithm)?;
    if body.len() < block + 2 + MDC_LEN {
        return Err(Error::IntegrityCheckFailed { reason: "encrypted data shorter than its MDC" });
    }

    let mut buffer = Zeroizing::new(body.to_vec());
    backend.cfb_decrypt(algorithm, session_key.as_bytes(), &mut buffer)?;

    let mdc_start = buffer.len() - MDC_LEN;
    if buffer[mdc_start..mdc_start + 2] != MDC_HEADER {
        return Err(Error::IntegrityCheckFailed { reason: "missing modification detection code" });
    }

    let mut sha1 = backend.hasher(HashAlgorithm::Sha1)?;
    sha1.update(&buffer[..mdc_start + 2]);
    let expected = sha1.finalize();
    if !digest_eq(&expected, &buffer[mdc_start + 2..]) {
        return Err(Error::IntegrityCheckFailed { reason: "modification detection code mismatch" });
    }

    Ok(Zeroizing::new(buffer[block + 2..mdc_start].to_vec()))
}

/// Cheap test of a candidate session key that was not itself authenticated.
///
/// Version 1 compares the two repeated octets of the random prefix. Version 2
/// opens the first chunk, or the final tag of an empty message. A `false`
/// result means the key is certainly wrong; `true` is not proof that it is
/// right.
pub fn quick_check(
    backend: &dyn CryptoBackend,
    data: &IntegrityProtectedData,
    algorithm: SymmetricAlgorithm,
    key: &[u8],
) -> Result<bool, CryptoError> {
    match data {
        IntegrityProtectedData::V1 { body } => {
            let block = algorithm
                .block_size()
                .ok_or(CryptoError::Unsupported(Unsupported::Symmetric(algorithm)))?;
            if body.len() < block + 2 {
                return Ok(false);
            }
            let mut prefix = Zeroizing::new(body[..block + 2].to_vec());
            backend.cfb_decrypt(algorithm, key, &mut prefix)?;
            Ok(prefix[block - 2..block] == prefix[block..block + 2])
        },
        IntegrityProtectedData::V2 { body, .. } => {
            let aead = AeadLayer::new(backend, data, key).map_err(|err| match err {
                Error::UnsupportedAlgorithm(unsupported) => CryptoError::Unsupported(unsupported),
                _ => CryptoError::InvalidKeyMaterial { reason: "session key does not fit cipher" },
            })?;
            let Some(ciphertext_len) = body.len().checked_sub(aead.tag_len) else {
                return Ok(false);
            };
            let result = if ciphertext_len == 0 {
                aead.open_final(backend, 0, 0, &body[..])
            } else {
                let first = ciphertext_len.min(aead.chunk_len + aead.tag_len);
                aead.open_chunk(backend, 0, &body[..first]).map(drop)
            };
            match result {
                Ok(()) => Ok(true),
                Err(CryptoError::AuthenticationFailed) => Ok(false),
                Err(err) => Err(err),
            }
        },
    }
}

/// Parameters of one version 2 encrypted data packet.
struct AeadLayer<'d> {
    symmetric: SymmetricAlgorithm,
    mode: AeadAlgorithm,
    message_key: Zeroizing<Vec<u8>>,
    iv: Vec<u8>,
    info: [u8; 5],
    chunk_len: usize,
    tag_len: usize,
    body: &'d [u8],
}

impl<'d> AeadLayer<'d> {
    /// Derives the message key and IV with HKDF-SHA256 over the session key,
    /// salted with the packet salt.
    fn new(
        backend: &dyn CryptoBackend,
        data: &'d IntegrityProtectedData,
        session_key: &[u8],
    ) -> Result<Self, Error> {
        let IntegrityProtectedData::V2 {
            symmetric_algorithm,
            aead_algorithm,
            chunk_size,
            salt,
            body,
        } = data
        else {
            return Err(Error::Crypto(CryptoError::InvalidParameters {
                reason: "AEAD layer over version 1 data".into(),
            }));
        };
        let (symmetric, mode) = (*symmetric_algorithm, *aead_algorithm);

        let key_len = symmetric
            .key_size()
            .ok_or(Error::UnsupportedAlgorithm(Unsupported::Symmetric(symmetric)))?;
        let nonce_len =
            mode.nonce_size().ok_or(Error::UnsupportedAlgorithm(Unsupported::Aead(mode)))?;
        let tag_len = mode.tag_size().ok_or(Error::UnsupportedAlgorithm(Unsupported::Aead(mode)))?;
        if session_key.len() != key_len {
            return Err(Error::Crypto(CryptoError::InvalidKeyLength {
                expected: key_len,
                actual: session_key.len(),
            }));
        }

        let info = [0xD2, 2, symmetric.into(), mode.into(), *chunk_size];
        let mut okm = Zeroizing::new(vec![0u8; key_len + nonce_len - 8]);
        backend.hkdf_sha256(session_key, Some(&salt[..]), &info, &mut okm)?;

        Ok(Self {
            symmetric,
            mode,
            message_key: Zeroizing::new(okm[..key_len].to_vec()),
            iv: okm[key_len..].to_vec(),
            info,
            chunk_len: IntegrityProtectedData::chunk_length(*chunk_size),
            tag_len,
            body,
        })
    }

    fn nonce(&self, index: u64) -> Vec<u8> {
        let mut nonce = Vec::with_capacity(self.iv.len() + 8);
        nonce.extend_from_slice(&self.iv);
        nonce.extend_from_slice(&index.to_be_bytes());
        nonce
    }

    fn open_chunk(
        &self,
        backend: &dyn CryptoBackend,
        index: u64,
        chunk: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        backend.aead_decrypt(
            self.symmetric,
            self.mode,
            &self.message_key,
            &self.nonce(index),
            &self.info,
            chunk,
        )
    }

    /// Checks the final tag, which authenticates the chunk count and the
    /// total plaintext length.
    fn open_final(
        &self,
        backend: &dyn CryptoBackend,
        index: u64,
        total: u64,
        tag: &[u8],
    ) -> Result<(), CryptoError> {
        let mut associated_data = self.info.to_vec();
        associated_data.extend_from_slice(&total.to_be_bytes());
        let empty = backend.aead_decrypt(
            self.symmetric,
            self.mode,
            &self.message_key,
            &self.nonce(index),
            &associated_data,
            tag,
        )?;
        if empty.is_empty() { Ok(()) } else { Err(CryptoError::AuthenticationFailed) }
    }

    fn decrypt(&self, backend: &dyn CryptoBackend) -> Result<Zeroizing<Vec<u8>>, Error> {
        let ciphertext_len = self
            .body
            .len()
            .checked_sub(self.tag_len)
            .ok_or(Error::IntegrityCheckFailed { reason: "encrypted data shorter than its tag" })?;
        let (chunks, final_tag) = self.body.split_at(ciphertext_len);

        let mut plaintext = Zeroizing::new(Vec::with_capacity(ciphertext_len));
        let mut index = 0u64;
        for chunk in chunks.chunks(self.chunk_len + self.tag_len) {
            if chunk.len() <= self.tag_len {
                return Err(Error::IntegrityCheckFailed { reason: "truncated chunk" });
            }
            let opened = self
                .open_chunk(backend, index, chunk)
                .map_err(|e| integrity(e, "chunk tag mismatch"))?;
            plaintext.extend_from_slice(&opened);
            index += 1;
        }

        self.open_final(backend, index, plaintext.len() as u64, final_tag)
            .map_err(|e| integrity(e, "final tag mismatch"))?;
        Ok(plaintext)
    }
}
