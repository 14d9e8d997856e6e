//! Fuzz target for the message grammar.
//!
//! Arbitrary token trees are judged by the reference recognizer, the
//! automaton and the full consumer.
//!
//! # Invariants
//!
//! - The automaton accepts a layer iff the reference recognizer does
//! - The consumer accepts a message iff every layer is accepted
//! - A rejected message fails as malformed, never with another error
//! - NEVER panic on any packet sequence

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ravel_core::{
    Certificates, ConsumerOptions, Credentials, Error, decrypt_and_verify,
    syntax::{InputSymbol, Pda},
};
use ravel_harness::{
    SimEnv, Token, is_layer, is_message, model::token::layer_symbols, render, session_key,
};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    seed: u64,
    tokens: Vec<Token>,
}

fn depth(tokens: &[Token]) -> usize {
    tokens.iter().map(Token::depth).max().unwrap_or(0)
}

fn pda_accepts(symbols: &[InputSymbol]) -> bool {
    let mut pda = Pda::new();
    symbols.iter().all(|symbol| pda.next(*symbol).is_ok())
        && pda.next(InputSymbol::EndOfSequence).is_ok()
        && pda.is_valid()
}

fuzz_target!(|input: FuzzInput| {
    if depth(&input.tokens) > 8 || input.tokens.len() > 64 {
        return;
    }

    let symbols = layer_symbols(&input.tokens);
    assert_eq!(pda_accepts(&symbols), is_layer(&input.tokens), "symbols: {symbols:?}");

    let env = SimEnv::with_seed(input.seed);
    let Ok(packets) = render(&env, &input.tokens) else {
        return;
    };
    let Ok(message) = ravel_proto::codec::encode_all(&packets) else {
        return;
    };
    let credentials = Credentials::new().with_session_key(session_key());
    let certificates = Certificates::new();
    let options = ConsumerOptions::new(&credentials, &certificates).with_env(&env);

    match decrypt_and_verify(&message, options) {
        Ok(_) => assert!(is_message(&input.tokens), "accepted {:?}", input.tokens),
        Err(Error::MalformedMessage(_)) => {
            assert!(!is_message(&input.tokens), "rejected {:?}", input.tokens);
        },
        Err(err) => panic!("non-structural error {err:?} for {:?}", input.tokens),
    }
});
