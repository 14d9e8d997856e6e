//! Turns tokens into real packets.
//!
//! Encrypted layers are sealed under [`SESSION_KEY`] as version 1 data, so a
//! consumer given [`session_key`] opens all of them without touching the key
//! packets. Signatures carry no valid signature value: their verification
//! fails and is recorded, which never affects structure.

use bytes::Bytes;
use ravel_crypto::SessionKey;
use ravel_proto::{
    CompressionAlgorithm, HashAlgorithm, KeyId, OnePassSignature, Packet,
    PassphraseEncryptedSessionKey, PublicKeyAlgorithm, S2k, Signature, SignatureMaterial,
    SignatureType, Subpacket, SubpacketKind, SymmetricAlgorithm, UnknownPacket,
};

use super::token::Token;
use crate::{
    builder::{BuildError, Encryption, MessageBuilder},
    sim_env::SimEnv,
};

/// Key of every encrypted layer a token tree renders to.
pub const SESSION_KEY: [u8; 16] = [0x5A; 16];

/// [`SESSION_KEY`] as a credential.
pub fn session_key() -> SessionKey {
    SessionKey::new(Some(SymmetricAlgorithm::Aes128), SESSION_KEY.to_vec())
}

const ISSUER: KeyId = KeyId::new([0x11; 8]);

/// Renders one layer of tokens, containers included.
pub fn render(env: &SimEnv, tokens: &[Token]) -> Result<Vec<Packet>, BuildError> {
    let mut packets = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token {
            Token::Encrypted(inner) => {
                let encryption = Encryption::seipd1()
                    .cipher(SymmetricAlgorithm::Aes128)
                    .session_key(&SESSION_KEY);
                let layer = MessageBuilder::from_packets(env, render(env, inner)?);
                packets.extend(layer.encrypt(&encryption)?.into_packets());
            },
            Token::Compressed(inner) => {
                let layer = MessageBuilder::from_packets(env, render(env, inner)?);
                packets.extend(layer.compress(CompressionAlgorithm::Uncompressed)?.into_packets());
            },
            Token::Literal(seed) => {
                let body = vec![*seed; usize::from(seed % 16)];
                packets.extend(MessageBuilder::literal(env, body).into_packets());
            },
            Token::Esk => packets.push(esk()),
            Token::OnePassSignature => packets.push(one_pass_signature()),
            Token::Signature => packets.push(signature(env)),
            Token::Marker => packets.push(Packet::Marker),
            Token::Padding => packets.push(Packet::Padding { length: 4 }),
            Token::Unexpected => packets.push(Packet::Unknown(UnknownPacket {
                tag: 6,
                body: Bytes::from_static(b"key"),
            })),
        }
    }
    Ok(packets)
}

fn esk() -> Packet {
    Packet::PassphraseEncryptedSessionKey(PassphraseEncryptedSessionKey::V4 {
        symmetric_algorithm: SymmetricAlgorithm::Aes128,
        s2k: S2k::Simple { hash: HashAlgorithm::Sha256 },
        encrypted_key: None,
    })
}

fn one_pass_signature() -> Packet {
    Packet::OnePassSignature(OnePassSignature {
        signature_type: SignatureType::Binary,
        hash_algorithm: HashAlgorithm::Sha256,
        public_key_algorithm: PublicKeyAlgorithm::Ed25519,
        issuer: ISSUER,
        last: true,
    })
}

fn signature(env: &SimEnv) -> Packet {
    Packet::Signature(Signature::new(
        SignatureType::Binary,
        PublicKeyAlgorithm::Ed25519,
        HashAlgorithm::Sha256,
        vec![Subpacket::new(SubpacketKind::CreationTime(env.unix_now()))],
        vec![Subpacket::new(SubpacketKind::Issuer(ISSUER))],
        [0; 2],
        SignatureMaterial::Ed25519([0; 64]),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn containers_render_to_one_packet() {
        let env = SimEnv::with_seed(1);
        let tokens = [
            Token::Esk,
            Token::Encrypted(vec![Token::Compressed(vec![Token::Literal(3)])]),
        ];
        let packets = render(&env, &tokens).unwrap();
        assert!(matches!(
            packets.as_slice(),
            [Packet::PassphraseEncryptedSessionKey(_), Packet::IntegrityProtectedData(_)]
        ));
    }
}
