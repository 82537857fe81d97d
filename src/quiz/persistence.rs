use async_trait::async_trait;
use thiserror::Error;

use super::{Answer, ChapterId, Question, QuizResult, SessionId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage contract the quiz engine consumes.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Questions of a chapter, in no particular order. Unknown chapters yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_questions(&self, chapter: ChapterId) -> Result<Vec<Question>, StorageError>;

    async fn save_answer(&self, answer: &Answer) -> Result<(), StorageError>;

    /// Every answer persisted for a session.
    async fn answers_for_session(&self, session: SessionId) -> Result<Vec<Answer>, StorageError>;

    async fn save_result(&self, result: &QuizResult) -> Result<(), StorageError>;
}
