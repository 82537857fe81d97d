use thiserror::Error;

use super::persistence::StorageError;
use super::ParticipantId;

/// Errors emitted by the quiz engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no active session for participant {0}")]
    NoActiveSession(ParticipantId),
    #[error("no questions available for this selection")]
    EmptyQuestionSet,
    #[error(transparent)]
    Storage(#[from] StorageError),
}
