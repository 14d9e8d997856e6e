//! Grammar alphabet: input symbols, automaton states and stack symbols.

use std::fmt;

use ravel_proto::{Packet, packet::tag};
use serde::{Deserialize, Serialize};

/// Grammar terminal a packet is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputSymbol {
    /// Public-key or passphrase encrypted session key.
    EncryptedSessionKey,
    /// Encrypted data, with or without integrity protection.
    EncryptedData,
    /// Compressed data.
    CompressedData,
    /// Literal data.
    LiteralData,
    /// One-pass signature.
    OnePassSignature,
    /// Signature.
    Signature,
    /// A packet that may not appear in a message at all.
    UnexpectedPacket,
    /// End of the packet sequence of the current message layer.
    EndOfSequence,
}

/// Automaton control state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    /// Expecting the start of a message.
    OpenPgpMessage,
    /// A literal data packet was read.
    LiteralMessage,
    /// A compressed data packet was read.
    CompressedMessage,
    /// Session key packets or encrypted data were read.
    EncryptedData,
    /// A trailing signature was read.
    SignedMessage,
    /// Accepting state.
    Valid,
}

/// Automaton stack symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackSymbol {
    /// Bottom of the stack. Peeked, never popped.
    Terminus,
    /// A message is still expected.
    Msg,
    /// A trailing signature is still owed.
    Sig,
}

impl fmt::Display for InputSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for StackSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Classifies a packet, or returns `None` for packets that are transparent to
/// the grammar.
///
/// Marker, Padding and non-critical unknown packets are skipped wherever
/// they occur. Every other packet without a grammar role is
/// [`InputSymbol::UnexpectedPacket`].
pub fn classify(packet: &Packet) -> Option<InputSymbol> {
    let symbol = match packet {
        Packet::PublicKeyEncryptedSessionKey(_) | Packet::PassphraseEncryptedSessionKey(_) => {
            InputSymbol::EncryptedSessionKey
        },
        Packet::SymmetricallyEncryptedData(_) | Packet::IntegrityProtectedData(_) => {
            InputSymbol::EncryptedData
        },
        Packet::CompressedData(_) => InputSymbol::CompressedData,
        Packet::LiteralData(_) => InputSymbol::LiteralData,
        Packet::OnePassSignature(_) => InputSymbol::OnePassSignature,
        Packet::Signature(_) => InputSymbol::Signature,
        Packet::Marker | Packet::Padding { .. } => return None,
        Packet::Unknown(unknown) if tag::is_non_critical(unknown.tag) => return None,
        Packet::Unknown(_) => InputSymbol::UnexpectedPacket,
    };
    Some(symbol)
}
