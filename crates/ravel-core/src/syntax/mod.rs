//! Message grammar validation.
//!
//! Every message layer (the outermost message and the contents of each
//! compressed or encrypted packet) is checked by its own pushdown automaton.
//! The automaton sees one [`InputSymbol`] per packet, plus
//! [`InputSymbol::EndOfSequence`] when the layer's packets run out.
//!
//! # Design
//!
//! - **Value-type core**: [`AutomatonState`] is advanced by the pure
//!   [`transition`] function, so every `(state, input, top)` combination can
//!   be tested in isolation.
//! - **Poisoning**: [`Pda`] remembers its first rejection and never accepts
//!   again.
//! - **Transparent packets**: Marker, Padding and non-critical unknown
//!   packets never reach the automaton (see [`classify`]).

mod pda;
mod symbol;
mod transition;

pub use pda::Pda;
pub use symbol::{InputSymbol, StackSymbol, State, classify};
pub use transition::{AutomatonState, transition};
