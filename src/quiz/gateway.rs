use async_trait::async_trait;
use thiserror::Error;

use super::formatter::Prompt;
use super::{ConversationId, QuestionToken};

/// How a question is shown and answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Poll,
    Buttons,
}

/// Where to send a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub conversation: ConversationId,
    /// Message to reply to, usually the one that triggered the session.
    pub reply_to: Option<i32>,
}

impl Delivery {
    pub fn to(conversation: ConversationId) -> Self {
        Self {
            conversation,
            reply_to: None,
        }
    }

    /// Same conversation, without replying to anything.
    pub fn direct(self) -> Self {
        Self {
            reply_to: None,
            ..self
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("unknown question token {0}")]
    UnknownToken(QuestionToken),
}

/// The chat platform, as seen by the quiz engine.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Display a question and return the token answers will refer to.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the platform rejected the message.
    async fn send_question(
        &self,
        delivery: Delivery,
        channel: Channel,
        prompt: &Prompt,
    ) -> Result<QuestionToken, GatewayError>;

    async fn send_text(&self, conversation: ConversationId, text: &str) -> Result<(), GatewayError>;

    /// Replace or annotate the displayed question with `text`.
    async fn edit_text(&self, token: &QuestionToken, text: &str) -> Result<(), GatewayError>;

    /// Retire a question that will never be resolved so it stops taking answers.
    async fn close(&self, token: &QuestionToken) -> Result<(), GatewayError>;
}
