//! Recursive-descent recognizer for the message grammar.
//!
//! ```text
//! Message   := Encrypted | Signed | Compressed | Literal
//! Encrypted := ESK* EncryptedData
//! Signed    := Signature Message | OnePassSignature Message Signature
//! ```
//!
//! Marker and Padding are dropped before parsing.

use ravel_core::syntax::InputSymbol;

use super::token::{Token, layer_symbols};

/// Parses one message starting at `pos`; returns the position after it.
fn message(symbols: &[InputSymbol], pos: usize) -> Option<usize> {
    match symbols.get(pos)? {
        InputSymbol::EncryptedSessionKey => {
            let data = (pos..symbols.len())
                .find(|&i| symbols[i] != InputSymbol::EncryptedSessionKey)?;
            (symbols[data] == InputSymbol::EncryptedData).then_some(data + 1)
        },
        InputSymbol::EncryptedData | InputSymbol::CompressedData | InputSymbol::LiteralData => {
            Some(pos + 1)
        },
        InputSymbol::Signature => message(symbols, pos + 1),
        InputSymbol::OnePassSignature => {
            let end = message(symbols, pos + 1)?;
            (symbols.get(end) == Some(&InputSymbol::Signature)).then_some(end + 1)
        },
        InputSymbol::UnexpectedPacket | InputSymbol::EndOfSequence => None,
    }
}

/// True if this layer's own packet sequence is one message. Container
/// contents are not inspected.
pub fn is_layer(tokens: &[Token]) -> bool {
    let symbols = layer_symbols(tokens);
    message(&symbols, 0) == Some(symbols.len())
}

/// True if the whole token tree is a valid message, every container's
/// contents included.
pub fn is_message(tokens: &[Token]) -> bool {
    is_layer(tokens) && tokens.iter().filter_map(Token::children).all(is_message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_is_a_message() {
        assert!(is_message(&[Token::Literal(0)]));
        assert!(!is_message(&[]));
        assert!(!is_message(&[Token::Literal(0), Token::Literal(1)]));
    }

    #[test]
    fn key_packets_need_encrypted_data() {
        assert!(is_message(&[Token::Esk, Token::Esk, Token::Encrypted(vec![Token::Literal(0)])]));
        assert!(!is_message(&[Token::Esk]));
        assert!(!is_message(&[Token::Esk, Token::Literal(0)]));
    }

    #[test]
    fn one_pass_signatures_nest() {
        let tokens = [
            Token::OnePassSignature,
            Token::OnePassSignature,
            Token::Literal(0),
            Token::Signature,
            Token::Signature,
        ];
        assert!(is_message(&tokens));
        assert!(!is_message(&tokens[..4]));
    }

    #[test]
    fn prefixed_signature_precedes_a_message() {
        assert!(is_message(&[Token::Signature, Token::Signature, Token::Literal(0)]));
        assert!(!is_message(&[Token::Literal(0), Token::Signature]));
    }

    #[test]
    fn container_contents_are_checked() {
        assert!(is_layer(&[Token::Compressed(Vec::new())]));
        assert!(!is_message(&[Token::Compressed(Vec::new())]));
        assert!(is_message(&[Token::Marker, Token::Compressed(vec![Token::Literal(2)])]));
    }
}
