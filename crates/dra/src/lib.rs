//! Deterministic register automata: execution, canonicalisation, symbolic
//! search, and the textual interchange format (spec §3, §4.B, §4.C, §6).
//!
//! Built on [`dra_core`]'s alphabet and sequence primitives. The learning
//! algorithms that drive a [`RegisterAutomaton`] hypothesis live one layer
//! up, in `dra-learning`.

pub mod automaton;
pub mod error;
pub mod format;
pub mod teacher;

pub use automaton::{Configuration, Location, RegisterAutomaton, Transition};
pub use error::DraError;
pub use format::{from_text, sample_from_text, sample_to_text, to_text, Sample};
pub use teacher::{find_difference, memorable, QueryCounts, Teacher};
