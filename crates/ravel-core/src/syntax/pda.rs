//! Stateful wrapper around the transition function.

use tracing::debug;

use super::{
    symbol::{InputSymbol, StackSymbol},
    transition::{AutomatonState, transition},
};
use crate::error::MalformedMessage;

/// Pushdown automaton recognising one message layer.
///
/// # Invariants
///
/// - Once a symbol is rejected the automaton is poisoned: every later call
///   to [`next`](Self::next) returns the first rejection again
/// - `history` holds exactly the accepted symbols, in order
#[derive(Debug, Clone, Default)]
pub struct Pda {
    current: AutomatonState,
    history: Vec<InputSymbol>,
    rejected: Option<MalformedMessage>,
}

impl Pda {
    /// Automaton in the start configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one input symbol.
    pub fn next(&mut self, input: InputSymbol) -> Result<(), MalformedMessage> {
        if let Some(rejected) = &self.rejected {
            return Err(rejected.clone());
        }

        match transition(&self.current, input) {
            Ok(next) => {
                self.current = next;
                self.history.push(input);
                Ok(())
            },
            Err(mut err) => {
                err.history = self.history.clone();
                debug!(state = %err.state, input = %input, "grammar rejected packet");
                self.rejected = Some(err.clone());
                Err(err)
            },
        }
    }

    /// True in the accepting configuration.
    pub fn is_valid(&self) -> bool {
        self.rejected.is_none() && self.current.is_valid()
    }

    /// Top of the stack.
    pub fn peek(&self) -> Option<StackSymbol> {
        self.current.top()
    }

    /// Fails unless the automaton accepted.
    ///
    /// The diagnostic names [`InputSymbol::EndOfSequence`] as the offending
    /// input, since the sequence ended before the grammar was satisfied.
    pub fn assert_valid(&self) -> Result<(), MalformedMessage> {
        if let Some(rejected) = &self.rejected {
            return Err(rejected.clone());
        }
        if self.current.is_valid() {
            return Ok(());
        }
        Err(MalformedMessage {
            history: self.history.clone(),
            state: self.current.state,
            stack: self.current.stack.clone(),
            input: InputSymbol::EndOfSequence,
        })
    }

    /// Accepted symbols so far.
    pub fn history(&self) -> &[InputSymbol] {
        &self.history
    }

    /// Current configuration.
    pub fn state(&self) -> &AutomatonState {
        &self.current
    }
}
