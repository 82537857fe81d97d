//! Live quiz sessions, one per participant.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::error::QuizError;
use super::formatter::{format_question, Prompt};
use super::gateway::{Channel, Delivery};
use super::{Answer, ChapterId, ConversationId, Mode, ParticipantId, Question, QuestionToken, SessionId};

/// Live state of one participant working through a question list.
///
/// `position` and `answers` move together: every resolved question adds
/// exactly one answer and advances the position by one.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    participant: ParticipantId,
    delivery: Delivery,
    chapter_id: ChapterId,
    questions: Vec<Question>,
    position: usize,
    mode: Mode,
    timer_enabled: bool,
    channel: Channel,
    pending: Option<QuestionToken>,
    answers: Vec<Answer>,
    started_at: DateTime<Utc>,
}

/// Where a session is in its display/answer cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingDisplay,
    AwaitingAnswer,
    Completed,
}

/// Why a resolve attempt changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    /// No question is out: the next one has not been displayed yet.
    NothingPending,
    StaleToken,
    InvalidOption,
}

#[derive(Debug, Clone)]
pub(crate) struct Resolution {
    pub answer: Answer,
    pub prompt: Prompt,
    pub next: Next,
}

#[derive(Debug, Clone)]
pub(crate) enum Next {
    Display,
    Complete(Finished),
}

/// Everything completion needs once the last question is resolved.
#[derive(Debug, Clone)]
pub(crate) struct Finished {
    pub session_id: SessionId,
    pub chapter_id: ChapterId,
    pub conversation: ConversationId,
    pub mode: Mode,
    pub total_questions: usize,
    pub answers: Vec<Answer>,
}

impl Session {
    pub fn new(
        participant: ParticipantId,
        delivery: Delivery,
        chapter_id: ChapterId,
        questions: Vec<Question>,
        mode: Mode,
        timer_enabled: bool,
        channel: Channel,
    ) -> Self {
        Self {
            id: SessionId::new(),
            participant,
            delivery,
            chapter_id,
            questions,
            position: 0,
            mode,
            timer_enabled,
            channel,
            pending: None,
            answers: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    pub fn chapter_id(&self) -> ChapterId {
        self.chapter_id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn timer_enabled(&self) -> bool {
        self.timer_enabled
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.position >= self.questions.len()
    }

    pub fn phase(&self) -> Phase {
        if self.is_complete() {
            Phase::Completed
        } else if self.pending.is_some() {
            Phase::AwaitingAnswer
        } else {
            Phase::AwaitingDisplay
        }
    }

    pub fn pending(&self) -> Option<&QuestionToken> {
        self.pending.as_ref()
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.position)
    }

    /// Prompt for the current question, if one is left.
    pub fn current_prompt(&self) -> Option<Prompt> {
        let question = self.current_question()?;
        Some(format_question(
            question,
            self.position,
            self.questions.len(),
            question.subject(),
        ))
    }

    /// Record that the current question is on screen under `token`.
    ///
    /// Later questions go straight to the conversation instead of replying
    /// to the message that started the session.
    pub(crate) fn mark_displayed(&mut self, token: QuestionToken) {
        self.pending = Some(token);
        self.delivery = self.delivery.direct();
    }

    /// Resolve the pending question with a selection, or with a timeout when
    /// `selected` is `None`.
    ///
    /// Only the first call carrying the pending token gets through; it clears
    /// the token, records the answer and advances in one step.
    pub(crate) fn resolve(
        &mut self,
        token: &QuestionToken,
        selected: Option<usize>,
    ) -> Result<Resolution, Rejection> {
        if self.phase() == Phase::AwaitingDisplay {
            return Err(Rejection::NothingPending);
        }
        if self.pending.as_ref() != Some(token) {
            return Err(Rejection::StaleToken);
        }
        let question = self
            .questions
            .get(self.position)
            .ok_or(Rejection::StaleToken)?;
        let prompt = format_question(
            question,
            self.position,
            self.questions.len(),
            question.subject(),
        );

        let answer = match selected {
            Some(index) => {
                let letter = prompt.letter_at(index).ok_or(Rejection::InvalidOption)?;
                Answer::selected(
                    self.id,
                    self.participant,
                    question.id(),
                    letter,
                    index == prompt.correct_index,
                )
            }
            None => Answer::timed_out(self.id, self.participant, question.id()),
        };

        self.pending = None;
        self.answers.push(answer.clone());
        self.position += 1;

        let next = if self.is_complete() {
            Next::Complete(Finished {
                session_id: self.id,
                chapter_id: self.chapter_id,
                conversation: self.delivery.conversation,
                mode: self.mode,
                total_questions: self.questions.len(),
                answers: self.answers.clone(),
            })
        } else {
            Next::Display
        };

        Ok(Resolution {
            answer,
            prompt,
            next,
        })
    }
}

/// A session plus the id it was created with, which never changes.
struct Slot {
    id: SessionId,
    session: Mutex<Session>,
}

impl Slot {
    fn new(session: Session) -> Arc<Self> {
        Arc::new(Self {
            id: session.id(),
            session: Mutex::new(session),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sessions keyed by participant.
///
/// Updates for one participant are serialized on that participant's slot.
/// No map shard is ever held while waiting on a slot.
#[derive(Clone, Default)]
pub struct SessionStore {
    slots: Arc<DashMap<ParticipantId, Arc<Slot>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `session`, replacing whatever the participant had before.
    pub fn create(&self, session: Session) -> Option<Session> {
        let participant = session.participant();
        let previous = self.slots.insert(participant, Slot::new(session))?;
        let session = previous.lock().clone();
        Some(session)
    }

    /// Snapshot of the participant's session.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoActiveSession` if the participant has none.
    pub fn get(&self, participant: ParticipantId) -> Result<Session, QuizError> {
        self.mutate(participant, |session| session.clone())
    }

    /// Apply `f` to the participant's session while holding its slot.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoActiveSession` if the participant has none.
    pub fn mutate<R>(
        &self,
        participant: ParticipantId,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, QuizError> {
        let slot = self.slot(participant)?;
        let mut session = slot.lock();
        Ok(f(&mut session))
    }

    pub fn remove(&self, participant: ParticipantId) -> Option<Session> {
        let (_, slot) = self.slots.remove(&participant)?;
        let session = slot.lock().clone();
        Some(session)
    }

    /// Remove the participant's session only if it is still `session_id`.
    pub fn remove_if(&self, participant: ParticipantId, session_id: SessionId) -> Option<Session> {
        let (_, slot) = self
            .slots
            .remove_if(&participant, |_, slot| slot.id == session_id)?;
        let session = slot.lock().clone();
        Some(session)
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.slots.contains_key(&participant)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, participant: ParticipantId) -> Result<Arc<Slot>, QuizError> {
        let slot = self
            .slots
            .get(&participant)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(QuizError::NoActiveSession(participant))?;
        Ok(slot)
    }
}
