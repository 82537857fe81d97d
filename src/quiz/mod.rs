pub mod engine;
pub mod error;
pub mod formatter;
pub mod gateway;
pub mod intake;
pub mod persistence;
pub mod render;
pub mod scorer;
pub mod session;
pub mod timer;

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// The person taking a quiz (a chat platform user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The chat/conversation handle questions are delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ConversationId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ChapterId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct QuestionId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle for a displayed question that has not been resolved yet.
///
/// The gateway hands one out per displayed question; answers and timer
/// expiries only count when they carry the token the session is waiting on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct QuestionToken(String);

impl QuestionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// A fresh random token, for gateways that cannot derive one from the platform.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Option slot of a stored question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub const ALL: [OptionLetter; 4] = [Self::A, Self::B, Self::C, Self::D];

    pub fn slot(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::D => 'D',
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    /// Displayed as `TRUE` / `FALSE`.
    TrueFalse { answer: bool },
    /// Up to four slots A-D; empty slots are skipped when displayed.
    MultipleChoice {
        options: [Option<String>; 4],
        correct: OptionLetter,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text is empty")]
    EmptyText,
    #[error("multiple choice question needs at least 2 options, got {0}")]
    TooFewOptions(usize),
    #[error("correct option {0} has no text")]
    CorrectOptionEmpty(OptionLetter),
}

/// A stored question. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    chapter_id: ChapterId,
    text: String,
    kind: QuestionKind,
    subject: Option<String>,
}

impl Question {
    pub fn true_false(
        id: QuestionId,
        chapter_id: ChapterId,
        text: impl Into<String>,
        answer: bool,
    ) -> Result<Self, QuestionError> {
        let text = non_empty_text(text.into())?;
        Ok(Self {
            id,
            chapter_id,
            text,
            kind: QuestionKind::TrueFalse { answer },
            subject: None,
        })
    }

    pub fn multiple_choice(
        id: QuestionId,
        chapter_id: ChapterId,
        text: impl Into<String>,
        options: [Option<String>; 4],
        correct: OptionLetter,
    ) -> Result<Self, QuestionError> {
        let text = non_empty_text(text.into())?;
        // Blank slots are the same as missing ones
        let options = options.map(|o| o.filter(|o| !o.trim().is_empty()));

        let populated = options.iter().filter(|o| o.is_some()).count();
        if populated < 2 {
            return Err(QuestionError::TooFewOptions(populated));
        }
        if options[correct.slot()].is_none() {
            return Err(QuestionError::CorrectOptionEmpty(correct));
        }

        Ok(Self {
            id,
            chapter_id,
            text,
            kind: QuestionKind::MultipleChoice { options, correct },
            subject: None,
        })
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn id(&self) -> QuestionId {
        self.id
    }

    pub fn chapter_id(&self) -> ChapterId {
        self.chapter_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    /// Course/subject name, only used to pick the timer duration.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }
}

fn non_empty_text(text: String) -> Result<String, QuestionError> {
    if text.trim().is_empty() {
        return Err(QuestionError::EmptyText);
    }
    Ok(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Mode {
    Exam,
    Practice {
        /// Render the chapter summary instead of the plain practice summary.
        chapter_tracking: bool,
    },
}

/// One resolved question. Created once, by a selection or by a timeout.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Answer {
    pub session_id: SessionId,
    pub participant: ParticipantId,
    pub question_id: QuestionId,
    /// `None` when the question timed out.
    pub selected: Option<OptionLetter>,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

impl Answer {
    pub fn selected(
        session_id: SessionId,
        participant: ParticipantId,
        question_id: QuestionId,
        selected: OptionLetter,
        is_correct: bool,
    ) -> Self {
        Self {
            session_id,
            participant,
            question_id,
            selected: Some(selected),
            is_correct,
            answered_at: Utc::now(),
        }
    }

    pub fn timed_out(
        session_id: SessionId,
        participant: ParticipantId,
        question_id: QuestionId,
    ) -> Self {
        Self {
            session_id,
            participant,
            question_id,
            selected: None,
            is_correct: false,
            answered_at: Utc::now(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.selected.is_none()
    }
}

/// Outcome of a finished exam.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuizResult {
    pub participant: ParticipantId,
    pub chapter_id: ChapterId,
    pub session_id: SessionId,
    pub score: usize,
    pub percentage: f64,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_choice_treats_blank_slots_as_empty() {
        let err = Question::multiple_choice(
            QuestionId(1),
            ChapterId(1),
            "Pick one",
            [Some("only".into()), Some("  ".into()), None, None],
            OptionLetter::A,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::TooFewOptions(1));
    }

    #[test]
    fn multiple_choice_rejects_empty_correct_slot() {
        let err = Question::multiple_choice(
            QuestionId(1),
            ChapterId(1),
            "Pick one",
            [Some("a".into()), Some("b".into()), None, None],
            OptionLetter::C,
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::CorrectOptionEmpty(OptionLetter::C));
    }

    #[test]
    fn rejects_empty_text() {
        assert_eq!(
            Question::true_false(QuestionId(1), ChapterId(1), " ", true).unwrap_err(),
            QuestionError::EmptyText
        );
    }

    #[test]
    fn timeout_answers_are_never_correct() {
        let answer = Answer::timed_out(SessionId::new(), ParticipantId(7), QuestionId(3));
        assert!(answer.is_timeout());
        assert!(!answer.is_correct);
    }
}
