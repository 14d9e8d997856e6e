//! Packet-level tokens for model-based testing.
//!
//! Tokens are generated by proptest and the fuzzer, then both fed to the
//! reference grammar and rendered into real packets.

use arbitrary::Arbitrary;
use ravel_core::syntax::InputSymbol;

/// One packet of a message, containers holding their inner message.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Token {
    /// Session key packet.
    Esk,
    /// Integrity-protected encrypted data around an inner message.
    Encrypted(Vec<Token>),
    /// Compressed data around an inner message.
    Compressed(Vec<Token>),
    /// Literal data; the seed picks the body.
    Literal(u8),
    /// One-pass signature.
    OnePassSignature,
    /// Signature, trailing or prefixed depending on where it sits.
    Signature,
    /// Marker packet.
    Marker,
    /// Padding packet.
    Padding,
    /// A key packet, which has no place in a message.
    Unexpected,
}

impl Token {
    /// Grammar symbol of this token, `None` for transparent packets.
    pub fn symbol(&self) -> Option<InputSymbol> {
        let symbol = match self {
            Self::Esk => InputSymbol::EncryptedSessionKey,
            Self::Encrypted(_) => InputSymbol::EncryptedData,
            Self::Compressed(_) => InputSymbol::CompressedData,
            Self::Literal(_) => InputSymbol::LiteralData,
            Self::OnePassSignature => InputSymbol::OnePassSignature,
            Self::Signature => InputSymbol::Signature,
            Self::Unexpected => InputSymbol::UnexpectedPacket,
            Self::Marker | Self::Padding => return None,
        };
        Some(symbol)
    }

    /// Inner message of a container.
    pub fn children(&self) -> Option<&[Token]> {
        match self {
            Self::Encrypted(inner) | Self::Compressed(inner) => Some(inner),
            _ => None,
        }
    }

    /// Number of message layers, this token's own layer included.
    pub fn depth(&self) -> usize {
        match self.children() {
            Some(inner) => 1 + inner.iter().map(Self::depth).max().unwrap_or(1),
            None => 1,
        }
    }
}

/// Symbols of one layer, transparent tokens removed.
pub fn layer_symbols(tokens: &[Token]) -> Vec<InputSymbol> {
    tokens.iter().filter_map(Token::symbol).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_counts_container_layers() {
        assert_eq!(Token::Literal(0).depth(), 1);
        let nested = Token::Compressed(vec![Token::Encrypted(vec![Token::Literal(1)])]);
        assert_eq!(nested.depth(), 3);
        assert_eq!(Token::Compressed(Vec::new()).depth(), 2);
    }

    #[test]
    fn transparent_tokens_have_no_symbol() {
        let symbols = layer_symbols(&[Token::Marker, Token::Literal(0), Token::Padding]);
        assert_eq!(symbols, vec![InputSymbol::LiteralData]);
    }
}
