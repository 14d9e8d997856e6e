//! Passphrase to key derivation.

use argon2::{Algorithm, Argon2, Params, Version};
use ravel_proto::{HashAlgorithm, S2k, Unsupported};
use zeroize::Zeroizing;

use crate::{error::CryptoError, hash::hasher, keys::Passphrase};

/// Octets fed per hash update while iterating.
const ITERATION_BLOCK: usize = 4096;

/// Fills `key` with material derived from `passphrase`.
///
/// Hash-based specifiers that need more octets than one digest run several
/// contexts, the n-th preloaded with n zero octets (RFC 9580 section 3.7.1).
pub fn derive_key(s2k: &S2k, passphrase: &Passphrase, key: &mut [u8]) -> Result<(), CryptoError> {
    let passphrase = passphrase.as_bytes();
    match s2k {
        S2k::Simple { hash } => hashed(*hash, key, |ctx| ctx.update(passphrase)),
        S2k::Salted { hash, salt } => hashed(*hash, key, |ctx| {
            ctx.update(salt);
            ctx.update(passphrase);
        }),
        S2k::IteratedSalted { hash, salt, count } => {
            let mut data = Zeroizing::new(Vec::with_capacity(salt.len() + passphrase.len()));
            data.extend_from_slice(salt);
            data.extend_from_slice(passphrase);
            let total = S2k::decode_count(*count).max(data.len());
            let block = Zeroizing::new(data.repeat((ITERATION_BLOCK / data.len()).max(1)));

            hashed(*hash, key, |ctx| {
                let mut remaining = total;
                while remaining > 0 {
                    let n = remaining.min(block.len());
                    ctx.update(&block[..n]);
                    remaining -= n;
                }
            })
        },
        S2k::Argon2 { salt, passes, parallelism, memory_exponent } => {
            let memory_kib = 1u32.checked_shl(u32::from(*memory_exponent)).ok_or_else(|| {
                CryptoError::InvalidParameters { reason: "memory exponent too large".into() }
            })?;
            let params = Params::new(
                memory_kib,
                u32::from(*passes),
                u32::from(*parallelism),
                Some(key.len()),
            )
            .map_err(|e| CryptoError::InvalidParameters { reason: e.to_string() })?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password_into(passphrase, salt, key)
                .map_err(|e| CryptoError::InvalidParameters { reason: e.to_string() })
        },
        S2k::Unknown { kind, .. } => Err(CryptoError::Unsupported(Unsupported::S2k(*kind))),
    }
}

fn hashed(
    algorithm: HashAlgorithm,
    key: &mut [u8],
    feed: impl Fn(&mut dyn crate::hash::Hasher),
) -> Result<(), CryptoError> {
    let mut filled = 0;
    let mut preload = 0usize;
    while filled < key.len() {
        let mut ctx = hasher(algorithm)?;
        ctx.update(&vec![0u8; preload]);
        feed(ctx.as_mut());
        let digest = Zeroizing::new(ctx.finalize());
        let n = digest.len().min(key.len() - filled);
        key[filled..filled + n].copy_from_slice(&digest[..n]);
        filled += n;
        preload += 1;
    }
    Ok(())
}
