//! Fuzz target for [`decrypt_and_verify`] on raw input.
//!
//! Bytes are fed either directly or spliced into a valid encrypted message,
//! so mutations reach the packet decoder, the key resolver and the
//! decryption layers.
//!
//! # Invariants
//!
//! - NEVER panic on any input
//! - A message whose final authentication octets were changed never
//!   yields the original plaintext

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ravel_core::{Certificates, ConsumerOptions, Credentials, DecryptionConfig, decrypt_and_verify};
use ravel_harness::{Encryption, MessageBuilder, SimEnv, TestRecipient};
use ravel_proto::AeadAlgorithm;

#[derive(Debug, Arbitrary)]
enum Scheme {
    Seipd1,
    Seipd2 { aead: u8, chunk_size: u8 },
}

#[derive(Debug, Arbitrary)]
enum FuzzInput {
    /// Raw bytes straight into the consumer.
    Raw(Vec<u8>),
    /// A valid message with one region overwritten.
    Spliced { scheme: Scheme, offset: u16, patch: Vec<u8> },
}

const PLAINTEXT: &[u8] = b"fuzzing the decryption pipeline";

fn encryption(scheme: &Scheme, recipient: &TestRecipient) -> Encryption {
    let encryption = match *scheme {
        Scheme::Seipd1 => Encryption::seipd1(),
        Scheme::Seipd2 { aead, chunk_size } => {
            let aead = match aead % 3 {
                0 => AeadAlgorithm::Eax,
                1 => AeadAlgorithm::Ocb,
                _ => AeadAlgorithm::Gcm,
            };
            Encryption::seipd2(aead, chunk_size % 3)
        },
    };
    encryption.passphrase("fuzz").recipient(recipient)
}

fuzz_target!(|input: FuzzInput| {
    let env = SimEnv::with_seed(0);
    let recipient = TestRecipient::from_seed(1);
    let credentials = Credentials::new()
        .with_key(recipient.decryption_key())
        .with_passphrase("wrong")
        .with_passphrase("fuzz");
    let certificates = Certificates::new();
    let config = DecryptionConfig {
        max_decompressed_length: 1024 * 1024,
        max_packet_length: 1024 * 1024,
        ..DecryptionConfig::default()
    };
    let options =
        ConsumerOptions::new(&credentials, &certificates).with_env(&env).with_config(config);

    let (message, original) = match input {
        FuzzInput::Raw(bytes) => (bytes, None),
        FuzzInput::Spliced { scheme, offset, patch } => {
            let Ok(builder) =
                MessageBuilder::literal(&env, PLAINTEXT).encrypt(&encryption(&scheme, &recipient))
            else {
                return;
            };
            let Ok(original) = builder.to_bytes() else {
                return;
            };
            let mut message = original.clone();
            let start = usize::from(offset) % message.len().max(1);
            for (byte, value) in message[start..].iter_mut().zip(&patch) {
                *byte = *value;
            }
            (message, Some(original))
        },
    };

    match decrypt_and_verify(&message, options) {
        Ok((plaintext, _)) => {
            if let Some(original) = original
                && plaintext == PLAINTEXT
            {
                let tail = &original[original.len() - 16..];
                let patched = &message[message.len() - 16..];
                assert_eq!(tail, patched, "tampered authentication data was accepted");
            }
        },
        Err(_) => {},
    }
});
