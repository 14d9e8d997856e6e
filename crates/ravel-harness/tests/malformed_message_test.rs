//! Diagnostics for packet sequences the grammar rejects.
//!
//! The error text names the rejected symbol, the automaton state and its
//! stack; these snapshots pin that format.

#![allow(clippy::unwrap_used)]

use insta::assert_snapshot;
use ravel_core::{
    Certificates, ConsumerOptions, Credentials, Error, MalformedMessage, decrypt_and_verify,
};
use ravel_harness::{SimEnv, Token, render, session_key};

fn reject(tokens: &[Token]) -> MalformedMessage {
    let env = SimEnv::with_seed(0);
    let message = ravel_proto::codec::encode_all(&render(&env, tokens).unwrap()).unwrap();
    let credentials = Credentials::new().with_session_key(session_key());
    let certificates = Certificates::new();
    let options = ConsumerOptions::new(&credentials, &certificates).with_env(&env);
    match decrypt_and_verify(&message, options) {
        Err(Error::MalformedMessage(malformed)) => malformed,
        other => unreachable!("expected a malformed message, got {other:?}"),
    }
}

#[test]
fn missing_trailing_signature() {
    let malformed = reject(&[Token::OnePassSignature, Token::Literal(1)]);
    assert_snapshot!(
        Error::from(malformed.clone()),
        @"malformed message: unexpected EndOfSequence in state LiteralMessage with stack [Terminus, Sig]"
    );
    assert_snapshot!(format!("{:?}", malformed.history), @"[OnePassSignature, LiteralData]");
}

#[test]
fn second_literal() {
    let malformed = reject(&[Token::Literal(1), Token::Literal(2)]);
    assert_snapshot!(
        malformed,
        @"unexpected LiteralData in state LiteralMessage with stack [Terminus]"
    );
}

#[test]
fn key_packet_before_literal() {
    let malformed = reject(&[Token::Esk, Token::Literal(1)]);
    assert_snapshot!(
        malformed,
        @"unexpected LiteralData in state EncryptedData with stack [Terminus, Msg]"
    );
}

#[test]
fn key_material_in_a_message() {
    let malformed = reject(&[Token::Unexpected, Token::Literal(1)]);
    assert_snapshot!(
        malformed,
        @"unexpected UnexpectedPacket in state OpenPgpMessage with stack [Terminus, Msg]"
    );
    assert!(malformed.history.is_empty());
}

#[test]
fn empty_compressed_layer() {
    let malformed = reject(&[Token::Compressed(Vec::new())]);
    assert_snapshot!(
        malformed,
        @"unexpected EndOfSequence in state OpenPgpMessage with stack [Terminus, Msg]"
    );
}

#[test]
fn signature_after_literal() {
    let malformed = reject(&[Token::Literal(3), Token::Signature]);
    assert_snapshot!(
        malformed,
        @"unexpected Signature in state LiteralMessage with stack [Terminus]"
    );
}

#[test]
fn rejection_inside_encrypted_layer() {
    let malformed = reject(&[
        Token::Esk,
        Token::Encrypted(vec![Token::Marker, Token::Literal(4), Token::Literal(5)]),
    ]);
    assert_snapshot!(format!("{:?}", malformed.history), @"[LiteralData]");
    assert_snapshot!(
        malformed,
        @"unexpected LiteralData in state LiteralMessage with stack [Terminus]"
    );
}
