//! Failure paths: wrong credentials and modified ciphertext.
//!
//! A modified message must never release plaintext, and a message that
//! cannot be opened must say which attempts were made.

#![allow(clippy::unwrap_used)]

use bytes::Bytes;
use ravel_core::{
    AttemptFailure, Certificates, ConsumerOptions, Credentials, DecryptionConfig, Error,
    ErrorCategory, KeySource, MessageMetadata, Policy, decrypt_and_verify,
};
use ravel_crypto::SessionKey;
use ravel_harness::{Encryption, MessageBuilder, SimEnv, TestRecipient};
use ravel_proto::{
    AeadAlgorithm, IntegrityProtectedData, Packet, SymmetricAlgorithm, SymmetricallyEncryptedData,
    Unsupported,
};

fn consume(
    env: &SimEnv,
    message: &[u8],
    credentials: &Credentials,
) -> Result<(Vec<u8>, MessageMetadata), Error> {
    let certificates = Certificates::new();
    decrypt_and_verify(message, ConsumerOptions::new(credentials, &certificates).with_env(env))
}

/// Flips one bit of the encrypted data body at `offset` from its end.
fn flip_from_end(builder: &mut MessageBuilder, offset: usize) {
    let Some(Packet::IntegrityProtectedData(data)) = builder.packets_mut().last_mut() else {
        unreachable!("message does not end in encrypted data");
    };
    let body = match data {
        IntegrityProtectedData::V1 { body } | IntegrityProtectedData::V2 { body, .. } => body,
    };
    let mut bytes = body.to_vec();
    let index = bytes.len() - 1 - offset;
    bytes[index] ^= 0x01;
    *body = Bytes::from(bytes);
}

#[test]
fn flipped_mdc_is_an_integrity_failure() {
    let env = SimEnv::with_seed(1);
    let mut builder = MessageBuilder::literal(&env, b"payload")
        .encrypt(&Encryption::seipd1().passphrase("pw"))
        .unwrap();
    flip_from_end(&mut builder, 0);

    let err = consume(&env, &builder.to_bytes().unwrap(), &Credentials::new().with_passphrase("pw"))
        .unwrap_err();
    assert!(matches!(err, Error::IntegrityCheckFailed { .. }), "{err:?}");
    assert_eq!(err.category(), ErrorCategory::Integrity);
}

#[test]
fn flipped_plaintext_is_an_integrity_failure() {
    let env = SimEnv::with_seed(2);
    let mut builder = MessageBuilder::literal(&env, vec![7u8; 64])
        .encrypt(&Encryption::seipd1().passphrase("pw"))
        .unwrap();
    flip_from_end(&mut builder, 40);

    let err = consume(&env, &builder.to_bytes().unwrap(), &Credentials::new().with_passphrase("pw"))
        .unwrap_err();
    assert!(matches!(err, Error::IntegrityCheckFailed { .. }), "{err:?}");
}

#[test]
fn flipped_final_tag_is_an_integrity_failure() {
    let env = SimEnv::with_seed(3);
    let recipient = TestRecipient::from_seed(5);
    let mut builder = MessageBuilder::literal(&env, b"payload")
        .encrypt(&Encryption::seipd2(AeadAlgorithm::Eax, 0).recipient(&recipient))
        .unwrap();
    flip_from_end(&mut builder, 0);

    let credentials = Credentials::new().with_key(recipient.decryption_key());
    let err = consume(&env, &builder.to_bytes().unwrap(), &credentials).unwrap_err();
    assert!(matches!(err, Error::IntegrityCheckFailed { .. }), "{err:?}");
}

#[test]
fn dropped_chunk_is_detected() {
    let env = SimEnv::with_seed(4);
    let recipient = TestRecipient::from_seed(6);
    let mut builder = MessageBuilder::literal(&env, vec![1u8; 500])
        .encrypt(&Encryption::seipd2(AeadAlgorithm::Ocb, 0).recipient(&recipient))
        .unwrap();
    let Some(Packet::IntegrityProtectedData(IntegrityProtectedData::V2 { body, .. })) =
        builder.packets_mut().last_mut()
    else {
        unreachable!("expected version 2 data");
    };
    let chunk = IntegrityProtectedData::chunk_length(0) + 16;
    let mut bytes = body[..chunk].to_vec();
    bytes.extend_from_slice(&body[2 * chunk..]);
    *body = Bytes::from(bytes);

    let credentials = Credentials::new().with_key(recipient.decryption_key());
    let err = consume(&env, &builder.to_bytes().unwrap(), &credentials).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Integrity);
}

#[test]
fn wrong_passphrases_are_all_recorded() {
    let env = SimEnv::with_seed(5);
    let message = MessageBuilder::literal(&env, b"secret")
        .encrypt(&Encryption::seipd2(AeadAlgorithm::Gcm, 1).passphrase("right"))
        .unwrap()
        .to_bytes()
        .unwrap();

    let credentials = Credentials::new().with_passphrase("nope").with_passphrase("still no");
    let err = consume(&env, &message, &credentials).unwrap_err();
    let Error::NoAcceptableDecryptionKey(resolution) = err else {
        unreachable!("expected key resolution failure, got {err:?}");
    };
    assert_eq!(resolution.attempts.len(), 2);
    assert_eq!(resolution.attempts[1].credential, Some(KeySource::Passphrase { index: 1 }));
    assert!(resolution.attempts.iter().all(|a| a.esk_index == Some(0)));
}

#[test]
fn recipient_without_key_is_no_matching_key() {
    let env = SimEnv::with_seed(6);
    let recipient = TestRecipient::from_seed(7);
    let message = MessageBuilder::literal(&env, b"secret")
        .encrypt(&Encryption::seipd1().recipient(&recipient))
        .unwrap()
        .to_bytes()
        .unwrap();

    let err = consume(&env, &message, &Credentials::new()).unwrap_err();
    let Error::NoAcceptableDecryptionKey(resolution) = err else {
        unreachable!("expected key resolution failure, got {err:?}");
    };
    assert!(matches!(
        resolution.attempts[0].failure,
        AttemptFailure::NoMatchingKey { recipient: Some(_) }
    ));
}

#[test]
fn wrong_supplied_session_key_fails_quick_check() {
    let env = SimEnv::with_seed(7);
    let message = MessageBuilder::literal(&env, b"secret")
        .encrypt(&Encryption::seipd1().passphrase("pw"))
        .unwrap()
        .to_bytes()
        .unwrap();

    let wrong = SessionKey::new(Some(SymmetricAlgorithm::Aes256), vec![0u8; 32]);
    let credentials = Credentials::new().with_session_key(wrong).with_passphrase("pw");
    let (plaintext, metadata) = consume(&env, &message, &credentials).unwrap();

    assert_eq!(plaintext, b"secret");
    assert_eq!(metadata.encryption().unwrap().key_source, KeySource::Passphrase { index: 0 });
}

#[test]
fn policy_rejected_cipher_is_unsupported() {
    let env = SimEnv::with_seed(8);
    let recipient = TestRecipient::from_seed(8);
    let message = MessageBuilder::literal(&env, b"secret")
        .encrypt(
            &Encryption::seipd2(AeadAlgorithm::Ocb, 0)
                .cipher(SymmetricAlgorithm::Aes128)
                .recipient(&recipient),
        )
        .unwrap()
        .to_bytes()
        .unwrap();

    let policy = Policy {
        symmetric_algorithms: vec![SymmetricAlgorithm::Aes256],
        ..Policy::default()
    };
    let config = DecryptionConfig { policy, ..DecryptionConfig::default() };
    let credentials = Credentials::new().with_key(recipient.decryption_key());
    let certificates = Certificates::new();
    let options =
        ConsumerOptions::new(&credentials, &certificates).with_env(&env).with_config(config);

    let err = decrypt_and_verify(&message, options).unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedAlgorithm(Unsupported::Symmetric(SymmetricAlgorithm::Aes128))
    ));
}

#[test]
fn unprotected_encryption_is_refused() {
    let env = SimEnv::with_seed(9);
    let data = SymmetricallyEncryptedData { body: Bytes::from_static(&[0u8; 64]) };
    let packets = vec![Packet::SymmetricallyEncryptedData(data)];
    let message = MessageBuilder::from_packets(&env, packets).to_bytes().unwrap();

    let err = consume(&env, &message, &Credentials::new().with_passphrase("pw")).unwrap_err();
    assert!(matches!(err, Error::MissingIntegrityProtection));
}
