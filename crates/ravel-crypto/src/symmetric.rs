//! OpenPGP CFB mode with an all-zero IV.
//!
//! SEIPD version 1 and SKESK version 4 both use plain CFB over the whole
//! buffer starting from a zero IV. The random prefix of SEIPD v1 takes the
//! role of the IV.

use cfb_mode::{BufDecryptor, BufEncryptor};
use cipher::{BlockCipher, BlockEncryptMut, BlockSizeUser, KeyInit, KeyIvInit};
use ravel_proto::{SymmetricAlgorithm, Unsupported};

use crate::error::CryptoError;

fn key_length_error(algorithm: SymmetricAlgorithm, key: &[u8]) -> CryptoError {
    CryptoError::InvalidKeyLength {
        expected: algorithm.key_size().unwrap_or_default(),
        actual: key.len(),
    }
}

fn decrypt_with<C>(key: &[u8], buffer: &mut [u8]) -> Result<(), ()>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    let iv = vec![0u8; C::block_size()];
    let mut cfb = BufDecryptor::<C>::new_from_slices(key, &iv).map_err(|_| ())?;
    cfb.decrypt(buffer);
    Ok(())
}

fn encrypt_with<C>(key: &[u8], buffer: &mut [u8]) -> Result<(), ()>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    let iv = vec![0u8; C::block_size()];
    let mut cfb = BufEncryptor::<C>::new_from_slices(key, &iv).map_err(|_| ())?;
    cfb.encrypt(buffer);
    Ok(())
}

/// Decrypts `buffer` in place.
pub fn cfb_decrypt(
    algorithm: SymmetricAlgorithm,
    key: &[u8],
    buffer: &mut [u8],
) -> Result<(), CryptoError> {
    let result = match algorithm {
        SymmetricAlgorithm::Aes128 => decrypt_with::<aes::Aes128>(key, buffer),
        SymmetricAlgorithm::Aes192 => decrypt_with::<aes::Aes192>(key, buffer),
        SymmetricAlgorithm::Aes256 => decrypt_with::<aes::Aes256>(key, buffer),
        other => return Err(CryptoError::Unsupported(Unsupported::Symmetric(other))),
    };
    result.map_err(|()| key_length_error(algorithm, key))
}

/// Encrypts `buffer` in place.
pub fn cfb_encrypt(
    algorithm: SymmetricAlgorithm,
    key: &[u8],
    buffer: &mut [u8],
) -> Result<(), CryptoError> {
    let result = match algorithm {
        SymmetricAlgorithm::Aes128 => encrypt_with::<aes::Aes128>(key, buffer),
        SymmetricAlgorithm::Aes192 => encrypt_with::<aes::Aes192>(key, buffer),
        SymmetricAlgorithm::Aes256 => encrypt_with::<aes::Aes256>(key, buffer),
        other => return Err(CryptoError::Unsupported(Unsupported::Symmetric(other))),
    };
    result.map_err(|()| key_length_error(algorithm, key))
}
