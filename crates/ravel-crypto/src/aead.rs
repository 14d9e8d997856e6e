//! AEAD modes registered for OpenPGP: EAX, OCB and GCM over AES.

use ::aead::{
    Aead, AeadCore, KeyInit, Nonce, Payload,
    consts::{U12, U15},
    generic_array::typenum::Unsigned,
};
use aes::{Aes128, Aes192, Aes256};
use aes_gcm::AesGcm;
use eax::Eax;
use ocb3::Ocb3;
use ravel_proto::{AeadAlgorithm, SymmetricAlgorithm, Unsupported};
use zeroize::Zeroizing;

use crate::error::CryptoError;

macro_rules! dispatch {
    ($symmetric:expr, $mode:expr, $op:ident($($arg:expr),*)) => {
        match ($symmetric, $mode) {
            (SymmetricAlgorithm::Aes128, AeadAlgorithm::Eax) => $op::<Eax<Aes128>>($($arg),*),
            (SymmetricAlgorithm::Aes192, AeadAlgorithm::Eax) => $op::<Eax<Aes192>>($($arg),*),
            (SymmetricAlgorithm::Aes256, AeadAlgorithm::Eax) => $op::<Eax<Aes256>>($($arg),*),
            (SymmetricAlgorithm::Aes128, AeadAlgorithm::Ocb) => $op::<Ocb3<Aes128, U15>>($($arg),*),
            (SymmetricAlgorithm::Aes192, AeadAlgorithm::Ocb) => $op::<Ocb3<Aes192, U15>>($($arg),*),
            (SymmetricAlgorithm::Aes256, AeadAlgorithm::Ocb) => $op::<Ocb3<Aes256, U15>>($($arg),*),
            (SymmetricAlgorithm::Aes128, AeadAlgorithm::Gcm) => {
                $op::<AesGcm<Aes128, U12>>($($arg),*)
            },
            (SymmetricAlgorithm::Aes192, AeadAlgorithm::Gcm) => {
                $op::<AesGcm<Aes192, U12>>($($arg),*)
            },
            (SymmetricAlgorithm::Aes256, AeadAlgorithm::Gcm) => {
                $op::<AesGcm<Aes256, U12>>($($arg),*)
            },
            (_, AeadAlgorithm::Other(_)) => Err(CryptoError::Unsupported(Unsupported::Aead($mode))),
            (other, _) => Err(CryptoError::Unsupported(Unsupported::Symmetric(other))),
        }
    };
}

fn init<A: AeadCore + KeyInit>(key: &[u8], nonce: &[u8]) -> Result<A, CryptoError> {
    let expected = <A as AeadCore>::NonceSize::USIZE;
    if nonce.len() != expected {
        return Err(CryptoError::InvalidNonceLength { expected, actual: nonce.len() });
    }
    A::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: <A as ::aead::KeySizeUser>::KeySize::USIZE,
        actual: key.len(),
    })
}

fn open_with<A: Aead + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    associated_data: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let aead = init::<A>(key, nonce)?;
    aead.decrypt(Nonce::<A>::from_slice(nonce), Payload { msg: ciphertext, aad: associated_data })
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

fn seal_with<A: Aead + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    associated_data: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let aead = init::<A>(key, nonce)?;
    aead.encrypt(Nonce::<A>::from_slice(nonce), Payload { msg: plaintext, aad: associated_data })
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Authenticates and decrypts `ciphertext || tag`.
pub fn open(
    symmetric: SymmetricAlgorithm,
    mode: AeadAlgorithm,
    key: &[u8],
    nonce: &[u8],
    associated_data: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    dispatch!(symmetric, mode, open_with(key, nonce, associated_data, ciphertext))
}

/// Encrypts and returns `ciphertext || tag`.
pub fn seal(
    symmetric: SymmetricAlgorithm,
    mode: AeadAlgorithm,
    key: &[u8],
    nonce: &[u8],
    associated_data: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    dispatch!(symmetric, mode, seal_with(key, nonce, associated_data, plaintext))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MODES: [AeadAlgorithm; 3] = [AeadAlgorithm::Eax, AeadAlgorithm::Ocb, AeadAlgorithm::Gcm];

    fn nonce(mode: AeadAlgorithm) -> Vec<u8> {
        vec![7; mode.nonce_size().unwrap()]
    }

    #[test]
    fn every_mode_authenticates() {
        let key = [1u8; 16];
        for mode in MODES {
            let sealed =
                seal(SymmetricAlgorithm::Aes128, mode, &key, &nonce(mode), b"ad", b"payload")
                    .unwrap();
            assert_eq!(sealed.len(), b"payload".len() + 16, "{mode}");

            let opened =
                open(SymmetricAlgorithm::Aes128, mode, &key, &nonce(mode), b"ad", &sealed).unwrap();
            assert_eq!(opened.as_slice(), b"payload", "{mode}");
        }
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = [2u8; 32];
        for mode in MODES {
            let mut sealed =
                seal(SymmetricAlgorithm::Aes256, mode, &key, &nonce(mode), b"", b"payload")
                    .unwrap();
            sealed[0] ^= 1;
            let result = open(SymmetricAlgorithm::Aes256, mode, &key, &nonce(mode), b"", &sealed);
            assert_eq!(result.err(), Some(CryptoError::AuthenticationFailed), "{mode}");
        }
    }

    #[test]
    fn associated_data_is_bound() {
        let key = [3u8; 16];
        let mode = AeadAlgorithm::Ocb;
        let sealed =
            seal(SymmetricAlgorithm::Aes128, mode, &key, &nonce(mode), b"one", b"x").unwrap();
        let result = open(SymmetricAlgorithm::Aes128, mode, &key, &nonce(mode), b"two", &sealed);
        assert_eq!(result.err(), Some(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn wrong_nonce_length_is_rejected() {
        let result =
            open(SymmetricAlgorithm::Aes128, AeadAlgorithm::Gcm, &[0; 16], &[0; 15], b"", &[0; 16]);
        let expected = CryptoError::InvalidNonceLength { expected: 12, actual: 15 };
        assert_eq!(result.err(), Some(expected));
    }

    #[test]
    fn unknown_mode_is_unsupported() {
        let result =
            open(SymmetricAlgorithm::Aes128, AeadAlgorithm::Other(9), &[0; 16], &[], b"", &[]);
        assert!(result.err().is_some_and(|e| e.is_unsupported()));
    }
}
