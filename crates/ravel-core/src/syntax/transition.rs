//! Pure transition function of the message grammar automaton.
//!
//! # Transition Table
//!
//! ```text
//! state             input        top       next state        push
//! OpenPgpMessage    ESK          Msg       EncryptedData     Msg
//! OpenPgpMessage    Signature    Msg       OpenPgpMessage    Msg
//! OpenPgpMessage    OnePassSig   Msg       OpenPgpMessage    Sig Msg
//! OpenPgpMessage    Literal      Msg       LiteralMessage
//! OpenPgpMessage    Compressed   Msg       CompressedMessage
//! OpenPgpMessage    Encrypted    Msg       EncryptedData
//! EncryptedData     ESK          Msg       EncryptedData     Msg
//! EncryptedData     Encrypted    Msg       EncryptedData
//! <element>         Signature    Sig       SignedMessage
//! <element>         End          Terminus  Valid
//! ```
//!
//! `<element>` is any of `LiteralMessage`, `CompressedMessage`,
//! `EncryptedData` and `SignedMessage`. Every other combination rejects.
//!
//! # Invariants
//!
//! - `Terminus` is never popped, so the stack is never empty
//! - At most one rule matches a `(state, input, top)` triple
//! - `Valid` has no outgoing transitions

use serde::{Deserialize, Serialize};

use super::symbol::{InputSymbol, StackSymbol, State};
use crate::error::MalformedMessage;

/// Automaton configuration: control state and stack, bottom first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AutomatonState {
    /// Control state.
    pub state: State,
    /// Stack contents, bottom first.
    pub stack: Vec<StackSymbol>,
}

impl AutomatonState {
    /// Start configuration: `OpenPgpMessage` over `[Terminus, Msg]`.
    pub fn initial() -> Self {
        Self { state: State::OpenPgpMessage, stack: vec![StackSymbol::Terminus, StackSymbol::Msg] }
    }

    /// Top of the stack.
    pub fn top(&self) -> Option<StackSymbol> {
        self.stack.last().copied()
    }

    /// True in `Valid` with nothing above `Terminus`.
    pub fn is_valid(&self) -> bool {
        self.state == State::Valid && self.stack == [StackSymbol::Terminus]
    }
}

impl Default for AutomatonState {
    fn default() -> Self {
        Self::initial()
    }
}

fn is_element(state: State) -> bool {
    matches!(
        state,
        State::LiteralMessage
            | State::CompressedMessage
            | State::EncryptedData
            | State::SignedMessage
    )
}

fn rule(
    state: State,
    input: InputSymbol,
    top: StackSymbol,
) -> Option<(State, &'static [StackSymbol])> {
    use InputSymbol as I;
    use StackSymbol::{Msg, Sig, Terminus};
    use State as S;

    match (state, input, top) {
        (S::OpenPgpMessage, I::EncryptedSessionKey, Msg) => Some((S::EncryptedData, &[Msg])),
        (S::OpenPgpMessage, I::Signature, Msg) => Some((S::OpenPgpMessage, &[Msg])),
        (S::OpenPgpMessage, I::OnePassSignature, Msg) => Some((S::OpenPgpMessage, &[Sig, Msg])),
        (S::OpenPgpMessage, I::LiteralData, Msg) => Some((S::LiteralMessage, &[])),
        (S::OpenPgpMessage, I::CompressedData, Msg) => Some((S::CompressedMessage, &[])),
        (S::OpenPgpMessage, I::EncryptedData, Msg) => Some((S::EncryptedData, &[])),
        (S::EncryptedData, I::EncryptedSessionKey, Msg) => Some((S::EncryptedData, &[Msg])),
        (S::EncryptedData, I::EncryptedData, Msg) => Some((S::EncryptedData, &[])),
        (s, I::Signature, Sig) if is_element(s) => Some((S::SignedMessage, &[])),
        (s, I::EndOfSequence, Terminus) if is_element(s) => Some((S::Valid, &[])),
        _ => None,
    }
}

/// Advances `current` by one input symbol.
///
/// The top of the stack is consumed by the transition unless it is
/// `Terminus`. The returned error carries no history; [`Pda`](super::Pda)
/// fills it in.
pub fn transition(
    current: &AutomatonState,
    input: InputSymbol,
) -> Result<AutomatonState, MalformedMessage> {
    let reject = || MalformedMessage {
        history: Vec::new(),
        state: current.state,
        stack: current.stack.clone(),
        input,
    };

    let top = current.top().ok_or_else(reject)?;
    let (state, push) = rule(current.state, input, top).ok_or_else(reject)?;

    let mut stack = current.stack.clone();
    if top != StackSymbol::Terminus {
        stack.pop();
    }
    stack.extend_from_slice(push);
    Ok(AutomatonState { state, stack })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const STATES: [State; 6] = [
        State::OpenPgpMessage,
        State::LiteralMessage,
        State::CompressedMessage,
        State::EncryptedData,
        State::SignedMessage,
        State::Valid,
    ];
    const INPUTS: [InputSymbol; 8] = [
        InputSymbol::EncryptedSessionKey,
        InputSymbol::EncryptedData,
        InputSymbol::CompressedData,
        InputSymbol::LiteralData,
        InputSymbol::OnePassSignature,
        InputSymbol::Signature,
        InputSymbol::UnexpectedPacket,
        InputSymbol::EndOfSequence,
    ];
    const TOPS: [StackSymbol; 3] = [StackSymbol::Terminus, StackSymbol::Msg, StackSymbol::Sig];

    fn run(inputs: &[InputSymbol]) -> Result<AutomatonState, MalformedMessage> {
        inputs.iter().try_fold(AutomatonState::initial(), |state, input| transition(&state, *input))
    }

    #[test]
    fn literal_message_is_valid() {
        let end = run(&[InputSymbol::LiteralData, InputSymbol::EndOfSequence]).unwrap();
        assert!(end.is_valid());
    }

    #[test]
    fn one_pass_signed_message_is_valid() {
        let end = run(&[
            InputSymbol::OnePassSignature,
            InputSymbol::LiteralData,
            InputSymbol::Signature,
            InputSymbol::EndOfSequence,
        ])
        .unwrap();
        assert!(end.is_valid());
    }

    #[test]
    fn encrypted_message_needs_data_after_key_packets() {
        let err = run(&[InputSymbol::EncryptedSessionKey, InputSymbol::EndOfSequence]).unwrap_err();
        assert_eq!(err.state, State::EncryptedData);
        assert_eq!(err.stack, vec![StackSymbol::Terminus, StackSymbol::Msg]);
        assert_eq!(err.input, InputSymbol::EndOfSequence);
    }

    #[test]
    fn terminus_is_never_popped() {
        let end = run(&[InputSymbol::CompressedData, InputSymbol::EndOfSequence]).unwrap();
        assert_eq!(end.stack, vec![StackSymbol::Terminus]);
    }

    #[test]
    fn valid_state_is_final() {
        let end = run(&[InputSymbol::LiteralData, InputSymbol::EndOfSequence]).unwrap();
        for input in INPUTS {
            assert!(transition(&end, input).is_err(), "{input:?} accepted in Valid");
        }
    }

    #[test]
    fn rejection_reports_configuration_before_input() {
        let start = AutomatonState::initial();
        let err = transition(&start, InputSymbol::UnexpectedPacket).unwrap_err();
        assert_eq!(err.stack, start.stack);
        assert_eq!(err.state, start.state);
    }

    #[test]
    fn table_is_deterministic_and_sparse() {
        // Ten rule rows, the two element rows each cover four states.
        let mut defined = 0;
        for state in STATES {
            for input in INPUTS {
                for top in TOPS {
                    if rule(state, input, top).is_some() {
                        defined += 1;
                    }
                }
            }
        }
        assert_eq!(defined, 8 + 2 * 4);
    }

    proptest! {
        #[test]
        fn stack_bottom_survives_any_input(
            inputs in prop::collection::vec(prop::sample::select(INPUTS.to_vec()), 0..32)
        ) {
            let mut state = AutomatonState::initial();
            for input in inputs {
                match transition(&state, input) {
                    Ok(next) => state = next,
                    Err(_) => break,
                }
                prop_assert_eq!(state.stack.first(), Some(&StackSymbol::Terminus));
            }
        }
    }
}
