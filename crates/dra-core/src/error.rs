use thiserror::Error;

/// Errors raised by the alphabet/sequence layer.
///
/// This is the crate boundary error for `dra-core`; `dra::DraError` and
/// `dra_learning::LearningError` both wrap it with `#[from]`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("domain mismatch: expected {expected:?}, found {found:?}")]
    DomainMismatch {
        expected: crate::value::Domain,
        found: crate::value::Domain,
    },

    #[error("sequences of length {lhs} and {rhs} are not of the same type")]
    LengthMismatch { lhs: usize, rhs: usize },

    #[error("index {index} is out of bounds for a sequence of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("cannot build a bijective map between sequences that are not of the same type")]
    NotSameType,

    #[error("failed to parse '{input}' as a {domain:?} value")]
    ParseValue {
        input: String,
        domain: crate::value::Domain,
    },
}
