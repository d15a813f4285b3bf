use thiserror::Error;

use dra_core::CoreError;

/// Errors raised by the automaton engine, symbolic search, and textual
/// format — the four kinds from spec §7 that apply below the learner.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DraError {
    #[error("malformed input: {0}")]
    InvalidInput(String),

    #[error("structure error: {0}")]
    StructureError(String),

    #[error(transparent)]
    TypeMismatch(#[from] CoreError),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
