//! The primitive-operations seam between message logic and cryptography.

use hkdf::Hkdf;
use ravel_proto::{
    AeadAlgorithm, HashAlgorithm, S2k, SessionKeyMaterial, SignatureMaterial, SymmetricAlgorithm,
    Unsupported,
};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{
    aead, ed25519,
    error::CryptoError,
    hash::{self, Hasher},
    keys::{DecryptionKey, Passphrase, PublicKeyMaterial, SecretKeyMaterial, VerifyingKey},
    s2k, symmetric, x25519,
};

/// Primitive operations the message consumer needs.
///
/// Implementations must be pure with respect to their inputs: the same
/// arguments always give the same result. Randomness is never needed on the
/// consuming side.
pub trait CryptoBackend: Send + Sync {
    /// Fresh hash context.
    fn hasher(&self, algorithm: HashAlgorithm) -> Result<Box<dyn Hasher>, CryptoError>;

    /// CFB decryption with an all-zero IV, in place.
    fn cfb_decrypt(
        &self,
        algorithm: SymmetricAlgorithm,
        key: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), CryptoError>;

    /// AEAD decryption of `ciphertext || tag`.
    fn aead_decrypt(
        &self,
        algorithm: SymmetricAlgorithm,
        mode: AeadAlgorithm,
        key: &[u8],
        nonce: &[u8],
        associated_data: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// HKDF-SHA256 expansion into `okm`.
    fn hkdf_sha256(
        &self,
        ikm: &[u8],
        salt: Option<&[u8]>,
        info: &[u8],
        okm: &mut [u8],
    ) -> Result<(), CryptoError>;

    /// Derives a key-encryption key from a passphrase.
    fn derive_key(
        &self,
        s2k: &S2k,
        passphrase: &Passphrase,
        key: &mut [u8],
    ) -> Result<(), CryptoError>;

    /// Decrypts a public-key encrypted session key.
    fn decrypt_session_key(
        &self,
        key: &DecryptionKey,
        material: &SessionKeyMaterial,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError>;

    /// Verifies a signature over a finished digest.
    fn verify(
        &self,
        key: &VerifyingKey,
        hash: HashAlgorithm,
        digest: &[u8],
        signature: &SignatureMaterial,
    ) -> Result<(), CryptoError>;
}

/// Default backend on the RustCrypto and dalek crates.
///
/// Supports AES-128/192/256, EAX/OCB/GCM, SHA-1 and SHA-2, iterated and
/// Argon2 S2K, X25519 and Ed25519.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCrypto;

impl CryptoBackend for RustCrypto {
    fn hasher(&self, algorithm: HashAlgorithm) -> Result<Box<dyn Hasher>, CryptoError> {
        hash::hasher(algorithm)
    }

    fn cfb_decrypt(
        &self,
        algorithm: SymmetricAlgorithm,
        key: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), CryptoError> {
        symmetric::cfb_decrypt(algorithm, key, buffer)
    }

    fn aead_decrypt(
        &self,
        algorithm: SymmetricAlgorithm,
        mode: AeadAlgorithm,
        key: &[u8],
        nonce: &[u8],
        associated_data: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        aead::open(algorithm, mode, key, nonce, associated_data, ciphertext)
    }

    fn hkdf_sha256(
        &self,
        ikm: &[u8],
        salt: Option<&[u8]>,
        info: &[u8],
        okm: &mut [u8],
    ) -> Result<(), CryptoError> {
        Hkdf::<Sha256>::new(salt, ikm).expand(info, okm).map_err(|_| {
            CryptoError::InvalidParameters { reason: format!("HKDF output of {} bytes", okm.len()) }
        })
    }

    fn derive_key(
        &self,
        s2k: &S2k,
        passphrase: &Passphrase,
        key: &mut [u8],
    ) -> Result<(), CryptoError> {
        s2k::derive_key(s2k, passphrase, key)
    }

    fn decrypt_session_key(
        &self,
        key: &DecryptionKey,
        material: &SessionKeyMaterial,
    ) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        match (key.material(), material) {
            (
                SecretKeyMaterial::X25519 { secret, .. },
                SessionKeyMaterial::X25519 { ephemeral, wrapped_key, .. },
            ) => x25519::unwrap_session_key(secret, ephemeral, wrapped_key),
            (_, SessionKeyMaterial::Opaque(_)) => Err(CryptoError::InvalidKeyMaterial {
                reason: "session key material does not match key",
            }),
        }
    }

    fn verify(
        &self,
        key: &VerifyingKey,
        hash: HashAlgorithm,
        digest: &[u8],
        signature: &SignatureMaterial,
    ) -> Result<(), CryptoError> {
        if hash.digest_size() != Some(digest.len()) {
            return Err(CryptoError::Unsupported(Unsupported::Hash(hash)));
        }
        match (key.material(), signature) {
            (PublicKeyMaterial::Ed25519(public), SignatureMaterial::Ed25519(sig)) => {
                ed25519::verify(public, digest, sig)
            },
            (_, SignatureMaterial::Opaque(_)) => Err(CryptoError::BadSignature),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use ravel_proto::KeyFlags;

    use super::*;

    #[test]
    fn verifies_ed25519_over_sha256_digest() {
        let seed = [8u8; 32];
        let key = VerifyingKey::ed25519(ed25519::public_key(&seed), 0, KeyFlags::SIGN_DATA);
        let mut ctx = RustCrypto.hasher(HashAlgorithm::Sha256).unwrap();
        ctx.update(b"signed data");
        let digest = ctx.finalize();
        let signature = SignatureMaterial::Ed25519(ed25519::sign(&seed, &digest));

        assert_eq!(RustCrypto.verify(&key, HashAlgorithm::Sha256, &digest, &signature), Ok(()));
        assert_eq!(
            RustCrypto.verify(&key, HashAlgorithm::Sha512, &digest, &signature),
            Err(CryptoError::Unsupported(Unsupported::Hash(HashAlgorithm::Sha512)))
        );
    }

    #[test]
    fn opaque_session_key_material_is_rejected() {
        let key = DecryptionKey::x25519([1; 32], 0, KeyFlags::ENCRYPT);
        let material = SessionKeyMaterial::Opaque(bytes::Bytes::from_static(b"rsa"));
        let result = RustCrypto.decrypt_session_key(&key, &material);
        assert!(matches!(result, Err(CryptoError::InvalidKeyMaterial { .. })));
    }

    #[test]
    fn hkdf_rejects_oversized_output() {
        let mut okm = vec![0u8; 255 * 32 + 1];
        assert!(RustCrypto.hkdf_sha256(b"ikm", None, b"info", &mut okm).is_err());
    }
}
