//! End-to-end consumption of messages built by the harness.
//!
//! Each test builds a message with [`MessageBuilder`], consumes it with
//! [`decrypt_and_verify`] and checks the plaintext and the metadata.

#![allow(clippy::unwrap_used)]

use ravel_core::{
    Certificates, ConsumerOptions, Credentials, Error, IntegrityProtection, KeySource, Layer,
    MessageMetadata, SignatureFailure, SignatureKind, decrypt_and_verify,
};
use ravel_harness::{
    Encryption, MessageBuilder, SignatureParams, SimEnv, TestRecipient, TestSigner,
};
use ravel_proto::{
    AeadAlgorithm, CompressionAlgorithm, HashAlgorithm, LiteralFormat, Packet, SignatureType,
    SymmetricAlgorithm,
};
use tracing_subscriber::EnvFilter;

const PLAINTEXT: &[u8] = b"The quick brown fox jumps over the lazy dog.\n";

fn consume(
    env: &SimEnv,
    message: &[u8],
    credentials: &Credentials,
    certificates: &Certificates,
) -> Result<(Vec<u8>, MessageMetadata), Error> {
    // RUST_LOG=ravel_core=trace shows each accepted packet.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    decrypt_and_verify(message, ConsumerOptions::new(credentials, certificates).with_env(env))
}

#[test]
fn plain_literal_message() {
    let env = SimEnv::with_seed(1);
    let message = MessageBuilder::literal_named(&env, "fox.txt", LiteralFormat::Text, PLAINTEXT)
        .to_bytes()
        .unwrap();

    let (plaintext, metadata) =
        consume(&env, &message, &Credentials::new(), &Certificates::new()).unwrap();

    assert_eq!(plaintext, PLAINTEXT);
    assert_eq!(metadata.filename(), Some("fox.txt"));
    assert_eq!(metadata.literal_data().unwrap().format, LiteralFormat::Text);
    assert!(!metadata.is_encrypted());
    assert!(!metadata.is_signed());
}

#[test]
fn signed_compressed_encrypted_with_passphrase() {
    let env = SimEnv::with_seed(2);
    let signer = TestSigner::from_seed(7);
    let message = MessageBuilder::literal(&env, PLAINTEXT)
        .sign(&signer)
        .unwrap()
        .compress(CompressionAlgorithm::Zlib)
        .unwrap()
        .encrypt(&Encryption::seipd1().passphrase("correct horse"))
        .unwrap()
        .to_bytes()
        .unwrap();

    let credentials = Credentials::new().with_passphrase("correct horse");
    let certificates = Certificates::new().with_key(signer.verifying_key());
    let (plaintext, metadata) = consume(&env, &message, &credentials, &certificates).unwrap();

    assert_eq!(plaintext, PLAINTEXT);
    assert!(metadata.is_verified());
    assert!(metadata.is_verified_signed_by(&signer.identifier()));
    assert_eq!(metadata.compression_algorithms(), vec![CompressionAlgorithm::Zlib]);

    let encryption = metadata.encryption().unwrap();
    assert_eq!(encryption.algorithm, SymmetricAlgorithm::Aes256);
    assert_eq!(encryption.integrity, IntegrityProtection::Mdc);
    assert_eq!(encryption.key_source, KeySource::Passphrase { index: 0 });
}

#[test]
fn layers_nest_in_message_order() {
    let env = SimEnv::with_seed(3);
    let signer = TestSigner::from_seed(1);
    let message = MessageBuilder::literal(&env, PLAINTEXT)
        .sign(&signer)
        .unwrap()
        .compress(CompressionAlgorithm::Zip)
        .unwrap()
        .encrypt(&Encryption::seipd1().passphrase("pw"))
        .unwrap()
        .to_bytes()
        .unwrap();

    let credentials = Credentials::new().with_passphrase("pw");
    let certificates = Certificates::new().with_key(signer.verifying_key());
    let (_, metadata) = consume(&env, &message, &credentials, &certificates).unwrap();

    let kinds: Vec<&str> = metadata
        .iter()
        .map(|layer| match layer {
            Layer::Encryption(_) => "encryption",
            Layer::Compression(_) => "compression",
            Layer::Literal(_) => "literal",
            Layer::Signature(_) => "signature",
        })
        .collect();
    assert_eq!(kinds, ["encryption", "compression", "literal", "signature"]);
    assert_eq!(metadata.layers().len(), 1);
    assert_eq!(metadata.layers()[0].children.len(), 1);
}

#[test]
fn aead_modes_round_trip() {
    let recipient = TestRecipient::from_seed(9);
    for (seed, mode) in [AeadAlgorithm::Eax, AeadAlgorithm::Ocb, AeadAlgorithm::Gcm]
        .into_iter()
        .enumerate()
    {
        let env = SimEnv::with_seed(seed as u64);
        let body = vec![0xAB; 300];
        let message = MessageBuilder::literal(&env, &body)
            .encrypt(&Encryption::seipd2(mode, 0).recipient(&recipient))
            .unwrap()
            .to_bytes()
            .unwrap();

        let credentials = Credentials::new().with_key(recipient.decryption_key());
        let (plaintext, metadata) =
            consume(&env, &message, &credentials, &Certificates::new()).unwrap();

        assert_eq!(plaintext, body, "{mode:?}");
        let encryption = metadata.encryption().unwrap();
        assert_eq!(encryption.integrity, IntegrityProtection::Aead(mode));
        assert_eq!(
            encryption.key_source,
            KeySource::PublicKey { fingerprint: recipient.fingerprint() }
        );
    }
}

#[test]
fn aead_with_passphrase_and_empty_body() {
    let env = SimEnv::with_seed(4);
    let message = MessageBuilder::literal(&env, b"")
        .encrypt(&Encryption::seipd2(AeadAlgorithm::Ocb, 4).passphrase("hunter2"))
        .unwrap()
        .to_bytes()
        .unwrap();

    let credentials = Credentials::new().with_passphrase("hunter2");
    let (plaintext, metadata) =
        consume(&env, &message, &credentials, &Certificates::new()).unwrap();

    assert!(plaintext.is_empty());
    assert_eq!(metadata.encryption().unwrap().key_source, KeySource::Passphrase { index: 0 });
}

#[test]
fn passphrase_fallback_uses_the_one_that_fits() {
    let env = SimEnv::with_seed(5);
    let message = MessageBuilder::literal(&env, PLAINTEXT)
        .encrypt(&Encryption::seipd1().passphrase("right"))
        .unwrap()
        .to_bytes()
        .unwrap();

    let credentials = Credentials::new()
        .with_passphrase("wrong")
        .with_passphrase("also wrong")
        .with_passphrase("right");
    let (plaintext, metadata) =
        consume(&env, &message, &credentials, &Certificates::new()).unwrap();

    assert_eq!(plaintext, PLAINTEXT);
    assert_eq!(metadata.encryption().unwrap().key_source, KeySource::Passphrase { index: 2 });
}

#[test]
fn supplied_session_key_opens_the_message() {
    let env = SimEnv::with_seed(6);
    let recipient = TestRecipient::from_seed(3);
    let (builder, session_key) = MessageBuilder::literal(&env, PLAINTEXT)
        .encrypt_with_key(&Encryption::seipd2(AeadAlgorithm::Gcm, 2).recipient(&recipient))
        .unwrap();

    let credentials = Credentials::new().with_session_key(session_key);
    let (plaintext, metadata) =
        consume(&env, &builder.to_bytes().unwrap(), &credentials, &Certificates::new()).unwrap();

    assert_eq!(plaintext, PLAINTEXT);
    assert_eq!(metadata.encryption().unwrap().key_source, KeySource::SessionKey { index: 0 });
}

#[test]
fn anonymous_recipient_is_found_by_trial() {
    let env = SimEnv::with_seed(7);
    let other = TestRecipient::from_seed(1);
    let recipient = TestRecipient::from_seed(2);
    let message = MessageBuilder::literal(&env, PLAINTEXT)
        .encrypt(&Encryption::seipd1().recipient(&recipient).anonymous())
        .unwrap()
        .to_bytes()
        .unwrap();

    let credentials =
        Credentials::new().with_key(other.decryption_key()).with_key(recipient.decryption_key());
    let (plaintext, metadata) =
        consume(&env, &message, &credentials, &Certificates::new()).unwrap();

    assert_eq!(plaintext, PLAINTEXT);
    assert_eq!(
        metadata.encryption().unwrap().key_source,
        KeySource::PublicKey { fingerprint: recipient.fingerprint() }
    );
}

#[test]
fn two_one_pass_signers() {
    let env = SimEnv::with_seed(8);
    let alice = TestSigner::from_seed(10);
    let bob = TestSigner::from_seed(11);
    let message =
        MessageBuilder::literal(&env, PLAINTEXT).sign(&alice).unwrap().sign(&bob).unwrap();

    let certificates =
        Certificates::new().with_key(alice.verifying_key()).with_key(bob.verifying_key());
    let (_, metadata) =
        consume(&env, &message.to_bytes().unwrap(), &Credentials::new(), &certificates).unwrap();

    assert_eq!(metadata.signatures().len(), 2);
    assert!(metadata.is_verified_signed_by(&alice.identifier()));
    assert!(metadata.is_verified_signed_by(&bob.identifier()));
}

#[test]
fn unknown_signer_is_reported_not_fatal() {
    let env = SimEnv::with_seed(9);
    let signer = TestSigner::from_seed(12);
    let stranger = TestSigner::from_seed(13);
    let message =
        MessageBuilder::literal(&env, PLAINTEXT).sign(&signer).unwrap().to_bytes().unwrap();

    let certificates = Certificates::new().with_key(stranger.verifying_key());
    let (plaintext, metadata) =
        consume(&env, &message, &Credentials::new(), &certificates).unwrap();

    assert_eq!(plaintext, PLAINTEXT);
    assert!(metadata.is_signed());
    assert!(!metadata.is_verified());
    let rejected = metadata.rejected_signatures();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].failure, Some(SignatureFailure::MissingCertificate));
}

#[test]
fn expired_signature_is_rejected() {
    let env = SimEnv::with_seed(10);
    let signer = TestSigner::from_seed(14);
    let params = SignatureParams { lifetime: Some(60), ..SignatureParams::default() };
    let message = MessageBuilder::literal(&env, PLAINTEXT)
        .sign_with(&signer, params)
        .unwrap()
        .to_bytes()
        .unwrap();
    env.advance(std::time::Duration::from_secs(3600));

    let certificates = Certificates::new().with_key(signer.verifying_key());
    let (_, metadata) = consume(&env, &message, &Credentials::new(), &certificates).unwrap();

    assert_eq!(metadata.signatures()[0].failure, Some(SignatureFailure::Expired));
}

#[test]
fn weak_hash_is_refused_by_policy() {
    let env = SimEnv::with_seed(11);
    let signer = TestSigner::from_seed(15);
    let params = SignatureParams { hash: HashAlgorithm::Sha1, ..SignatureParams::default() };
    let message = MessageBuilder::literal(&env, PLAINTEXT)
        .sign_with(&signer, params)
        .unwrap()
        .to_bytes()
        .unwrap();

    let certificates = Certificates::new().with_key(signer.verifying_key());
    let (plaintext, metadata) =
        consume(&env, &message, &Credentials::new(), &certificates).unwrap();

    assert_eq!(plaintext, PLAINTEXT);
    assert_eq!(
        metadata.signatures()[0].failure,
        Some(SignatureFailure::HashRejected(HashAlgorithm::Sha1))
    );
}

#[test]
fn text_signature_over_lf_data() {
    let env = SimEnv::with_seed(12);
    let signer = TestSigner::from_seed(16);
    let params =
        SignatureParams { signature_type: SignatureType::Text, ..SignatureParams::default() };
    let message = MessageBuilder::literal_named(&env, "", LiteralFormat::Utf8, "one\ntwo\n")
        .sign_with(&signer, params)
        .unwrap()
        .to_bytes()
        .unwrap();

    let certificates = Certificates::new().with_key(signer.verifying_key());
    let (_, metadata) = consume(&env, &message, &Credentials::new(), &certificates).unwrap();

    assert!(metadata.is_verified());
    assert_eq!(metadata.signatures()[0].signature_type, SignatureType::Text);
}

#[test]
fn prefixed_signature_verifies() {
    let env = SimEnv::with_seed(13);
    let signer = TestSigner::from_seed(17);
    let message = MessageBuilder::literal(&env, PLAINTEXT)
        .prefix_sign(&signer)
        .unwrap()
        .to_bytes()
        .unwrap();

    let certificates = Certificates::new().with_key(signer.verifying_key());
    let (_, metadata) = consume(&env, &message, &Credentials::new(), &certificates).unwrap();

    let signatures = metadata.signatures();
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].kind, SignatureKind::Prefixed);
    assert!(signatures[0].verified);
}

#[test]
fn marker_and_padding_do_not_disturb_decryption() {
    let env = SimEnv::with_seed(14);
    let message = MessageBuilder::literal(&env, PLAINTEXT)
        .with_padding(32)
        .encrypt(&Encryption::seipd1().passphrase("pw"))
        .unwrap()
        .with_marker()
        .to_bytes()
        .unwrap();

    let credentials = Credentials::new().with_passphrase("pw");
    let (plaintext, _) = consume(&env, &message, &credentials, &Certificates::new()).unwrap();
    assert_eq!(plaintext, PLAINTEXT);
}

#[derive(Debug, Clone, Copy)]
enum Wrap {
    Sign,
    Compress,
    Encrypt,
}

/// Applies `steps` innermost first, so `[Compress, Sign, Encrypt]` builds
/// an encrypted message holding a signed compressed one.
fn wrap(env: &SimEnv, signers: &[TestSigner; 2], steps: &[Wrap]) -> Vec<u8> {
    let mut builder = MessageBuilder::literal(env, PLAINTEXT);
    let mut signers = signers.iter();
    for step in steps {
        builder = match step {
            Wrap::Sign => builder.sign(signers.next().unwrap()),
            Wrap::Compress => builder.compress(CompressionAlgorithm::Zip),
            Wrap::Encrypt => builder.encrypt(&Encryption::seipd1().passphrase("pw")),
        }
        .unwrap();
    }
    builder.to_bytes().unwrap()
}

#[test]
fn layer_orderings_are_all_encrypted_and_verified() {
    use Wrap::{Compress, Encrypt, Sign};

    let signers = [TestSigner::from_seed(20), TestSigner::from_seed(21)];
    let credentials = Credentials::new().with_passphrase("pw");
    let certificates = Certificates::new()
        .with_key(signers[0].verifying_key())
        .with_key(signers[1].verifying_key());

    let cases: [(&str, &[Wrap], usize); 5] = [
        ("encrypt(sign(compress))", &[Compress, Sign, Encrypt], 1),
        ("sign(encrypt(compress))", &[Compress, Encrypt, Sign], 1),
        ("compress(sign(encrypt))", &[Encrypt, Sign, Compress], 1),
        ("sign(compress(encrypt))", &[Encrypt, Compress, Sign], 1),
        ("sign(encrypt(sign))", &[Sign, Encrypt, Sign], 2),
    ];
    for (seed, (name, steps, signatures)) in cases.into_iter().enumerate() {
        let env = SimEnv::with_seed(100 + seed as u64);
        let message = wrap(&env, &signers, steps);

        let (plaintext, metadata) = consume(&env, &message, &credentials, &certificates).unwrap();

        assert_eq!(plaintext, PLAINTEXT, "{name}");
        assert!(metadata.is_encrypted(), "{name}");
        assert!(metadata.is_verified(), "{name}");
        assert_eq!(metadata.signatures().len(), signatures, "{name}");
    }
}

#[test]
fn wrong_certificate_under_encryption_is_not_verified() {
    let env = SimEnv::with_seed(15);
    let signer = TestSigner::from_seed(22);
    let stranger = TestSigner::from_seed(23);
    let message = MessageBuilder::literal(&env, PLAINTEXT)
        .sign(&signer)
        .unwrap()
        .encrypt(&Encryption::seipd2(AeadAlgorithm::Ocb, 0).passphrase("pw"))
        .unwrap()
        .to_bytes()
        .unwrap();

    let credentials = Credentials::new().with_passphrase("pw");
    let certificates = Certificates::new().with_key(stranger.verifying_key());
    let (plaintext, metadata) = consume(&env, &message, &credentials, &certificates).unwrap();

    assert_eq!(plaintext, PLAINTEXT);
    assert!(metadata.is_encrypted());
    assert!(metadata.is_signed());
    assert!(!metadata.is_verified());
    assert!(!metadata.is_verified_signed_by(&signer.identifier()));
}

#[test]
fn altered_literal_under_encryption_fails_verification() {
    let env = SimEnv::with_seed(16);
    let signer = TestSigner::from_seed(24);
    let mut builder = MessageBuilder::literal(&env, PLAINTEXT).sign(&signer).unwrap();
    for packet in builder.packets_mut() {
        if let Packet::LiteralData(literal) = packet {
            let mut body = literal.body.to_vec();
            body[0] ^= 0x01;
            literal.body = body.into();
        }
    }
    let message =
        builder.encrypt(&Encryption::seipd1().passphrase("pw")).unwrap().to_bytes().unwrap();

    let credentials = Credentials::new().with_passphrase("pw");
    let certificates = Certificates::new().with_key(signer.verifying_key());
    let (plaintext, metadata) = consume(&env, &message, &credentials, &certificates).unwrap();

    assert_ne!(plaintext, PLAINTEXT);
    assert!(metadata.is_encrypted());
    assert!(metadata.is_signed());
    assert!(!metadata.is_verified());
    assert!(matches!(
        metadata.signatures()[0].failure,
        Some(SignatureFailure::DigestPrefixMismatch | SignatureFailure::BadSignature)
    ));
}
