//! Message construction for tests.
//!
//! [`MessageBuilder`] starts from a literal packet and wraps it, one layer
//! per call, in signatures, compression and encryption. Every random octet
//! comes from the [`SimEnv`], so a seed reproduces a message exactly.
//!
//! ```text
//! literal ─► sign ─► compress ─► encrypt ─► to_bytes
//! ```

use std::io::{self, Write};

use bytes::Bytes;
use flate2::{
    Compression,
    write::{DeflateEncoder, ZlibEncoder},
};
use ravel_crypto::{
    CryptoBackend, CryptoError, Passphrase, RustCrypto, SessionKey, SignatureHasher, aead, s2k,
    symmetric, x25519,
};
use ravel_proto::{
    AeadAlgorithm, CompressedData, CompressionAlgorithm, HashAlgorithm, IntegrityProtectedData,
    KeyIdentifier, LiteralData, LiteralFormat, OnePassSignature, Packet,
    PassphraseEncryptedSessionKey, ProtocolError, PublicKeyAlgorithm, PublicKeyEncryptedSessionKey,
    S2k, SessionKeyMaterial, Signature, SignatureMaterial, SignatureType, Subpacket, SubpacketKind,
    SymmetricAlgorithm, Unsupported, codec,
};
use thiserror::Error;

use crate::{
    keys::{TestRecipient, TestSigner},
    sim_env::SimEnv,
};

/// Failure while building a message.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A primitive refused its input.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Compression failed.
    #[error("compression failed: {0}")]
    Io(#[from] io::Error),

    /// A packet could not be framed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Signing needs the literal data, which a raw packet list lacks.
    #[error("no literal data to sign")]
    NoLiteral,
}

/// Signature creation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureParams {
    /// Digest algorithm.
    pub hash: HashAlgorithm,
    /// Binary or text signature.
    pub signature_type: SignatureType,
    /// Creation time. `None` takes the environment clock.
    pub created: Option<u32>,
    /// Validity period in seconds.
    pub lifetime: Option<u32>,
}

impl Default for SignatureParams {
    fn default() -> Self {
        Self {
            hash: HashAlgorithm::Sha256,
            signature_type: SignatureType::Binary,
            created: None,
            lifetime: None,
        }
    }
}

/// Encrypted data packet version and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// CFB with a modification detection code. Paired with version 4
    /// passphrase packets and version 3 public-key packets.
    Seipd1,
    /// Chunked AEAD. Paired with version 6 key packets.
    Seipd2 {
        /// AEAD mode.
        aead: AeadAlgorithm,
        /// Chunk size octet.
        chunk_size: u8,
    },
}

/// Who may open an encrypted layer.
#[derive(Debug, Clone)]
pub struct Encryption {
    scheme: Scheme,
    cipher: SymmetricAlgorithm,
    passphrases: Vec<String>,
    recipients: Vec<TestRecipient>,
    anonymous: bool,
    session_key: Option<Vec<u8>>,
}

impl Encryption {
    /// AES-256 encryption under `scheme` with no recipients yet.
    pub fn new(scheme: Scheme) -> Self {
        Self {
            scheme,
            cipher: SymmetricAlgorithm::Aes256,
            passphrases: Vec::new(),
            recipients: Vec::new(),
            anonymous: false,
            session_key: None,
        }
    }

    /// Version 1 encrypted data.
    pub fn seipd1() -> Self {
        Self::new(Scheme::Seipd1)
    }

    /// Version 2 encrypted data.
    pub fn seipd2(aead: AeadAlgorithm, chunk_size: u8) -> Self {
        Self::new(Scheme::Seipd2 { aead, chunk_size })
    }

    /// Replaces the data cipher.
    #[must_use]
    pub fn cipher(mut self, cipher: SymmetricAlgorithm) -> Self {
        self.cipher = cipher;
        self
    }

    /// Adds a passphrase key packet.
    #[must_use]
    pub fn passphrase(mut self, passphrase: &str) -> Self {
        self.passphrases.push(passphrase.to_string());
        self
    }

    /// Adds a public-key key packet.
    #[must_use]
    pub fn recipient(mut self, recipient: &TestRecipient) -> Self {
        self.recipients.push(recipient.clone());
        self
    }

    /// Leaves the recipient field of public-key packets empty.
    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    /// Uses `key` instead of a random session key.
    #[must_use]
    pub fn session_key(mut self, key: &[u8]) -> Self {
        self.session_key = Some(key.to_vec());
        self
    }
}

/// Builds OpenPGP messages layer by layer.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    env: SimEnv,
    packets: Vec<Packet>,
    signed_data: Option<Bytes>,
}

impl MessageBuilder {
    /// Binary literal message without a file name.
    pub fn literal(env: &SimEnv, body: impl AsRef<[u8]>) -> Self {
        Self::literal_named(env, "", LiteralFormat::Binary, body)
    }

    /// Literal message with a file name and format.
    pub fn literal_named(
        env: &SimEnv,
        filename: &str,
        format: LiteralFormat,
        body: impl AsRef<[u8]>,
    ) -> Self {
        let body = Bytes::copy_from_slice(body.as_ref());
        let literal = LiteralData {
            format,
            filename: Bytes::copy_from_slice(filename.as_bytes()),
            modification_time: env.unix_now(),
            body: body.clone(),
        };
        Self {
            env: env.clone(),
            packets: vec![Packet::LiteralData(literal)],
            signed_data: Some(body),
        }
    }

    /// Message made of arbitrary packets. It cannot be signed.
    pub fn from_packets(env: &SimEnv, packets: Vec<Packet>) -> Self {
        Self { env: env.clone(), packets, signed_data: None }
    }

    /// Wraps the message in a one-pass signature with default parameters.
    pub fn sign(self, signer: &TestSigner) -> Result<Self, BuildError> {
        self.sign_with(signer, SignatureParams::default())
    }

    /// Wraps the message as `OnePassSignature ‖ message ‖ Signature`.
    pub fn sign_with(
        mut self,
        signer: &TestSigner,
        params: SignatureParams,
    ) -> Result<Self, BuildError> {
        let signature = self.signature(signer, params)?;
        let ops = OnePassSignature {
            signature_type: params.signature_type,
            hash_algorithm: params.hash,
            public_key_algorithm: PublicKeyAlgorithm::Ed25519,
            issuer: signer.key_id(),
            last: true,
        };
        self.packets.insert(0, Packet::OnePassSignature(ops));
        self.packets.push(Packet::Signature(signature));
        Ok(self)
    }

    /// Prepends a signature over the message.
    pub fn prefix_sign(mut self, signer: &TestSigner) -> Result<Self, BuildError> {
        let signature = self.signature(signer, SignatureParams::default())?;
        self.packets.insert(0, Packet::Signature(signature));
        Ok(self)
    }

    fn signature(
        &self,
        signer: &TestSigner,
        params: SignatureParams,
    ) -> Result<Signature, BuildError> {
        let data = self.signed_data.as_ref().ok_or(BuildError::NoLiteral)?;
        let created = params.created.unwrap_or_else(|| self.env.unix_now());

        let mut hashed = vec![
            Subpacket::new(SubpacketKind::CreationTime(created)),
            Subpacket::new(SubpacketKind::IssuerFingerprint(signer.fingerprint())),
        ];
        if let Some(lifetime) = params.lifetime {
            hashed.push(Subpacket::new(SubpacketKind::ExpirationTime(lifetime)));
        }
        let unhashed = vec![Subpacket::new(SubpacketKind::Issuer(signer.key_id()))];

        let unsigned = Signature::new(
            params.signature_type,
            PublicKeyAlgorithm::Ed25519,
            params.hash,
            hashed.clone(),
            unhashed.clone(),
            [0; 2],
            SignatureMaterial::Ed25519([0; 64]),
        );
        let mut hasher =
            SignatureHasher::new(RustCrypto.hasher(params.hash)?, params.signature_type);
        hasher.update(data);
        let digest = hasher.finalize(&unsigned.hash_trailer());

        Ok(Signature::new(
            params.signature_type,
            PublicKeyAlgorithm::Ed25519,
            params.hash,
            hashed,
            unhashed,
            [digest[0], digest[1]],
            SignatureMaterial::Ed25519(signer.sign(&digest)),
        ))
    }

    /// Wraps the message in a compressed data packet.
    ///
    /// Algorithms without an encoder here get the raw packet stream as body.
    pub fn compress(mut self, algorithm: CompressionAlgorithm) -> Result<Self, BuildError> {
        let inner = codec::encode_all(&self.packets)?;
        let body = match algorithm {
            CompressionAlgorithm::Zip => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&inner)?;
                encoder.finish()?
            },
            CompressionAlgorithm::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&inner)?;
                encoder.finish()?
            },
            _ => inner,
        };
        let compressed = CompressedData { algorithm, body: body.into() };
        self.packets = vec![Packet::CompressedData(compressed)];
        Ok(self)
    }

    /// Wraps the message in key packets and an encrypted data packet.
    pub fn encrypt(self, encryption: &Encryption) -> Result<Self, BuildError> {
        self.encrypt_with_key(encryption).map(|(builder, _)| builder)
    }

    /// Like [`encrypt`](Self::encrypt), also returning the session key.
    pub fn encrypt_with_key(
        mut self,
        encryption: &Encryption,
    ) -> Result<(Self, SessionKey), BuildError> {
        let cipher = encryption.cipher;
        let key_len = cipher
            .key_size()
            .ok_or(CryptoError::Unsupported(Unsupported::Symmetric(cipher)))?;
        let key = match &encryption.session_key {
            Some(key) => key.clone(),
            None => {
                let mut key = vec![0u8; key_len];
                self.env.random_bytes(&mut key);
                key
            },
        };

        let plaintext = codec::encode_all(&self.packets)?;
        let mut packets = Vec::new();
        for passphrase in &encryption.passphrases {
            let skesk = self.passphrase_packet(encryption, passphrase, &key)?;
            packets.push(Packet::PassphraseEncryptedSessionKey(skesk));
        }
        for recipient in &encryption.recipients {
            let pkesk = self.public_key_packet(encryption, recipient, &key)?;
            packets.push(Packet::PublicKeyEncryptedSessionKey(pkesk));
        }
        let data = match encryption.scheme {
            Scheme::Seipd1 => self.seal_v1(cipher, &key, &plaintext)?,
            Scheme::Seipd2 { aead, chunk_size } => {
                self.seal_v2(cipher, aead, chunk_size, &key, &plaintext)?
            },
        };
        packets.push(Packet::IntegrityProtectedData(data));

        self.packets = packets;
        Ok((self, SessionKey::new(Some(cipher), key)))
    }

    fn passphrase_packet(
        &self,
        encryption: &Encryption,
        passphrase: &str,
        session_key: &[u8],
    ) -> Result<PassphraseEncryptedSessionKey, BuildError> {
        let cipher = encryption.cipher;
        let passphrase = Passphrase::from(passphrase);
        let mut kek = vec![0u8; session_key.len()];

        match encryption.scheme {
            Scheme::Seipd1 => {
                let s2k = S2k::IteratedSalted {
                    hash: HashAlgorithm::Sha256,
                    salt: self.env.random_array(),
                    count: 0x60,
                };
                s2k::derive_key(&s2k, &passphrase, &mut kek)?;
                let mut encrypted = vec![u8::from(cipher)];
                encrypted.extend_from_slice(session_key);
                symmetric::cfb_encrypt(cipher, &kek, &mut encrypted)?;
                Ok(PassphraseEncryptedSessionKey::V4 {
                    symmetric_algorithm: cipher,
                    s2k,
                    encrypted_key: Some(encrypted.into()),
                })
            },
            Scheme::Seipd2 { aead: mode, .. } => {
                let s2k = S2k::Argon2 {
                    salt: self.env.random_array(),
                    passes: 1,
                    parallelism: 1,
                    memory_exponent: 10,
                };
                let mut ikm = vec![0u8; session_key.len()];
                s2k::derive_key(&s2k, &passphrase, &mut ikm)?;
                let info = [0xC3, 6, u8::from(cipher), u8::from(mode)];
                RustCrypto.hkdf_sha256(&ikm, None, &info, &mut kek)?;

                let nonce_len =
                    mode.nonce_size().ok_or(CryptoError::Unsupported(Unsupported::Aead(mode)))?;
                let mut iv = vec![0u8; nonce_len];
                self.env.random_bytes(&mut iv);
                let encrypted_key = aead::seal(cipher, mode, &kek, &iv, &info, session_key)?;
                Ok(PassphraseEncryptedSessionKey::V6 {
                    symmetric_algorithm: cipher,
                    aead_algorithm: mode,
                    s2k,
                    iv: iv.into(),
                    encrypted_key: encrypted_key.into(),
                })
            },
        }
    }

    fn public_key_packet(
        &self,
        encryption: &Encryption,
        recipient: &TestRecipient,
        session_key: &[u8],
    ) -> Result<PublicKeyEncryptedSessionKey, BuildError> {
        let (ephemeral, wrapped_key) =
            x25519::wrap_session_key(recipient.public(), self.env.random_array(), session_key)?;
        let (version, named, symmetric_algorithm) = match encryption.scheme {
            Scheme::Seipd1 => {
                (3, KeyIdentifier::KeyId(recipient.key_id()), Some(encryption.cipher))
            },
            Scheme::Seipd2 { .. } => {
                (6, KeyIdentifier::Fingerprint(recipient.fingerprint()), None)
            },
        };
        Ok(PublicKeyEncryptedSessionKey {
            version,
            recipient: (!encryption.anonymous).then_some(named),
            algorithm: PublicKeyAlgorithm::X25519,
            material: SessionKeyMaterial::X25519 {
                ephemeral,
                symmetric_algorithm,
                wrapped_key: wrapped_key.into(),
            },
        })
    }

    fn seal_v1(
        &self,
        cipher: SymmetricAlgorithm,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<IntegrityProtectedData, BuildError> {
        let block = cipher
            .block_size()
            .ok_or(CryptoError::Unsupported(Unsupported::Symmetric(cipher)))?;
        let mut body = vec![0u8; block];
        self.env.random_bytes(&mut body);
        body.extend_from_within(block - 2..block);
        body.extend_from_slice(plaintext);
        body.extend_from_slice(&[0xD3, 0x14]);

        let mut sha1 = RustCrypto.hasher(HashAlgorithm::Sha1)?;
        sha1.update(&body);
        body.extend_from_slice(&sha1.finalize());
        symmetric::cfb_encrypt(cipher, key, &mut body)?;
        Ok(IntegrityProtectedData::V1 { body: body.into() })
    }

    fn seal_v2(
        &self,
        cipher: SymmetricAlgorithm,
        mode: AeadAlgorithm,
        chunk_size: u8,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<IntegrityProtectedData, BuildError> {
        let nonce_len =
            mode.nonce_size().ok_or(CryptoError::Unsupported(Unsupported::Aead(mode)))?;
        let salt: [u8; 32] = self.env.random_array();
        let info = [0xD2, 2, u8::from(cipher), u8::from(mode), chunk_size];
        let mut okm = vec![0u8; key.len() + nonce_len - 8];
        RustCrypto.hkdf_sha256(key, Some(&salt[..]), &info, &mut okm)?;
        let (message_key, iv) = okm.split_at(key.len());
        let nonce = |index: u64| [iv, &index.to_be_bytes()[..]].concat();

        let mut body = Vec::new();
        let mut index = 0u64;
        for chunk in plaintext.chunks(IntegrityProtectedData::chunk_length(chunk_size)) {
            body.extend(aead::seal(cipher, mode, message_key, &nonce(index), &info, chunk)?);
            index += 1;
        }
        let mut final_ad = info.to_vec();
        final_ad.extend_from_slice(&(plaintext.len() as u64).to_be_bytes());
        body.extend(aead::seal(cipher, mode, message_key, &nonce(index), &final_ad, &[])?);

        Ok(IntegrityProtectedData::V2 {
            symmetric_algorithm: cipher,
            aead_algorithm: mode,
            chunk_size,
            salt,
            body: body.into(),
        })
    }

    /// Puts a marker packet in front.
    #[must_use]
    pub fn with_marker(mut self) -> Self {
        self.packets.insert(0, Packet::Marker);
        self
    }

    /// Appends a padding packet.
    #[must_use]
    pub fn with_padding(mut self, length: usize) -> Self {
        self.packets.push(Packet::Padding { length });
        self
    }

    /// Packets of the outermost layer.
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// Mutable packets of the outermost layer, for tampering.
    pub fn packets_mut(&mut self) -> &mut Vec<Packet> {
        &mut self.packets
    }

    /// Gives up the builder for its packets.
    pub fn into_packets(self) -> Vec<Packet> {
        self.packets
    }

    /// Encoded message.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BuildError> {
        Ok(codec::encode_all(&self.packets)?)
    }
}
