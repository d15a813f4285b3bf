use thiserror::Error;

use dra::DraError;

/// Errors raised by the observation table, active learner, passive RPNI
/// learner, and characteristic sample generator (spec §7's `LearningFailure`
/// plus the lower-layer errors it can wrap).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LearningError {
    #[error(transparent)]
    Dra(#[from] DraError),

    #[error("learning failed: {0}")]
    LearningFailure(String),
}
