//! The progression controller.
//!
//! A session cycles display -> await -> resolve until its last question is
//! resolved. Answers and timer expiries both funnel into [`QuizEngine::resolve`],
//! and only the first one carrying the pending token gets through.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use rand::seq::SliceRandom;

use super::error::QuizError;
use super::formatter::Prompt;
use super::gateway::{Channel, Delivery, MessagingGateway};
use super::intake::{AnswerChannel, AnswerEvent, AnswerOutcome};
use super::persistence::Persistence;
use super::render::{self, Completion};
use super::scorer::{Score, Scorer};
use super::session::{Finished, Next, Rejection, Session, SessionStore};
use super::timer::{Expiry, TimerScheduler};
use super::{ChapterId, Mode, ParticipantId, QuestionToken, SessionId};

/// What a participant asked to start.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub participant: ParticipantId,
    pub delivery: Delivery,
    pub chapter: ChapterId,
    pub mode: Mode,
    pub timer_enabled: bool,
}

#[derive(Clone)]
pub struct QuizEngine {
    sessions: SessionStore,
    timers: TimerScheduler,
    gateway: Arc<dyn MessagingGateway>,
    persistence: Arc<dyn Persistence>,
    scorer: Scorer,
    channel: Channel,
    shuffle: bool,
}

impl QuizEngine {
    pub fn new(gateway: Arc<dyn MessagingGateway>, persistence: Arc<dyn Persistence>) -> Self {
        Self {
            sessions: SessionStore::new(),
            timers: TimerScheduler::new(),
            gateway,
            scorer: Scorer::new(persistence.clone()),
            persistence,
            channel: Channel::default(),
            shuffle: true,
        }
    }

    #[must_use]
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }

    /// Whether loaded questions are put in random order.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn with_pass_threshold(mut self, pass_threshold: f64) -> Self {
        self.scorer = self.scorer.with_pass_threshold(pass_threshold);
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn timers(&self) -> &TimerScheduler {
        &self.timers
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Load the chapter, open a session and show its first question.
    ///
    /// Any session the participant already had is discarded.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyQuestionSet` if the chapter has no questions,
    /// or `QuizError::Storage` if they could not be loaded.
    pub async fn start(&self, request: StartRequest) -> Result<SessionId, QuizError> {
        let mut questions = self.persistence.load_questions(request.chapter).await?;
        if questions.is_empty() {
            info!(
                "Chapter {:?} has no questions, not starting a session for {}",
                request.chapter, request.participant
            );
            return Err(QuizError::EmptyQuestionSet);
        }
        if self.shuffle {
            questions.shuffle(&mut rand::thread_rng());
        }

        let session = Session::new(
            request.participant,
            request.delivery,
            request.chapter,
            questions,
            request.mode,
            request.timer_enabled,
            self.channel,
        );
        let session_id = session.id();
        let total = session.len();

        if let Some(previous) = self.sessions.create(session) {
            self.release(&previous).await;
            info!(
                "Discarded session {} of participant {}",
                previous.id(),
                request.participant
            );
        }
        info!(
            "Participant {} started {:?} session {} on chapter {:?} ({} questions)",
            request.participant, request.mode, session_id, request.chapter, total
        );

        self.display_current(request.participant, session_id).await;
        Ok(session_id)
    }

    /// Handle a decoded answer.
    pub async fn on_answer(&self, event: AnswerEvent) -> AnswerOutcome {
        self.resolve(event.participant, &event.token, Some(event.selected_index))
            .await
    }

    /// Decode a raw channel payload and handle it.
    pub async fn receive<C: AnswerChannel>(&self, channel: &C, raw: C::Raw) -> AnswerOutcome {
        match channel.decode(raw) {
            Some(event) => self.on_answer(event).await,
            None => {
                debug!("Ignoring unrecognized answer payload");
                AnswerOutcome::Unrecognized
            }
        }
    }

    /// End the participant's session without a summary.
    pub async fn stop(&self, participant: ParticipantId) -> bool {
        match self.sessions.remove(participant) {
            Some(session) => {
                self.release(&session).await;
                info!(
                    "Participant {} stopped session {} at question {}/{}",
                    participant,
                    session.id(),
                    session.position() + 1,
                    session.len()
                );
                true
            }
            None => false,
        }
    }

    async fn display_current(&self, participant: ParticipantId, session_id: SessionId) {
        let current = self.sessions.mutate(participant, |session| {
            if session.id() != session_id || session.pending().is_some() {
                return None;
            }
            let prompt = session.current_prompt()?;
            Some((prompt, session.delivery(), session.channel()))
        });
        let Ok(Some((prompt, delivery, channel))) = current else {
            debug!("Nothing to display for participant {}", participant);
            return;
        };

        let Some(token) = self.deliver(delivery, channel, &prompt).await else {
            self.abandon(participant, session_id, delivery).await;
            return;
        };

        // The timer is armed under the same lock that publishes the token, so
        // an answer can never be resolved before its timer exists.
        let displayed = self.sessions.mutate(participant, |session| {
            if session.id() != session_id || session.pending().is_some() {
                return false;
            }
            session.mark_displayed(token.clone());
            if session.timer_enabled() {
                let engine = self.clone();
                let expired = token.clone();
                self.timers.arm(
                    participant,
                    token.clone(),
                    Duration::from_secs(prompt.timer_seconds),
                    move || engine.expire(participant, expired),
                );
            }
            true
        });
        if !matches!(displayed, Ok(true)) {
            debug!(
                "Session {} of {} moved on before question {} was shown",
                session_id, participant, token
            );
        }
    }

    /// Send a question, falling back to a direct message once.
    async fn deliver(
        &self,
        delivery: Delivery,
        channel: Channel,
        prompt: &Prompt,
    ) -> Option<QuestionToken> {
        match self.gateway.send_question(delivery, channel, prompt).await {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(
                    "Failed to send question to {:?}: {}. Retrying directly",
                    delivery.conversation, e
                );
                match self
                    .gateway
                    .send_question(delivery.direct(), channel, prompt)
                    .await
                {
                    Ok(token) => Some(token),
                    Err(e) => {
                        error!(
                            "Failed to send question to {:?} directly: {}",
                            delivery.conversation, e
                        );
                        None
                    }
                }
            }
        }
    }

    fn expire(&self, participant: ParticipantId, token: QuestionToken) -> Expiry {
        let engine = self.clone();
        Box::pin(async move {
            let outcome = engine.resolve(participant, &token, None).await;
            debug!("Timeout of {} for {}: {:?}", token, participant, outcome);
        })
    }

    /// Resolve the pending question with a selection, or a timeout for `None`.
    async fn resolve(
        &self,
        participant: ParticipantId,
        token: &QuestionToken,
        selected: Option<usize>,
    ) -> AnswerOutcome {
        let resolution = match self
            .sessions
            .mutate(participant, |session| session.resolve(token, selected))
        {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(Rejection::NothingPending)) => {
                debug!(
                    "Answer {} from participant {} arrived while no question was awaiting one \
                     (next question not displayed yet, or already resolved)",
                    token, participant
                );
                return AnswerOutcome::StaleToken;
            }
            Ok(Err(Rejection::StaleToken)) => {
                debug!("Stale token {} from participant {}", token, participant);
                return AnswerOutcome::StaleToken;
            }
            Ok(Err(Rejection::InvalidOption)) => {
                debug!(
                    "Option {:?} is not valid for {} (participant {})",
                    selected, token, participant
                );
                return AnswerOutcome::InvalidOption;
            }
            Err(_) => {
                debug!("No active session for participant {}", participant);
                return AnswerOutcome::NoActiveSession;
            }
        };
        self.timers.cancel(participant, token);

        let answer = &resolution.answer;
        if let Err(e) = self.persistence.save_answer(answer).await {
            error!(
                "Failed to save answer to question {:?} of session {}: {}",
                answer.question_id, answer.session_id, e
            );
        }
        let feedback = render::feedback(&resolution.prompt, answer);
        if let Err(e) = self.gateway.edit_text(token, &feedback).await {
            warn!("Failed to show feedback for {}: {}", token, e);
        }

        match resolution.next {
            Next::Display => {
                self.display_current(participant, resolution.answer.session_id)
                    .await
            }
            Next::Complete(finished) => self.complete(participant, finished).await,
        }
        AnswerOutcome::Accepted
    }

    async fn complete(&self, participant: ParticipantId, finished: Finished) {
        let pass_threshold = self.scorer.pass_threshold();
        let completion = match finished.mode {
            Mode::Exam => Completion::Exam(
                self.scorer
                    .finalize(
                        participant,
                        finished.chapter_id,
                        finished.session_id,
                        finished.total_questions,
                    )
                    .await,
            ),
            Mode::Practice {
                chapter_tracking: true,
            } => Completion::Chapter(Score::tally(
                finished.total_questions,
                &finished.answers,
                pass_threshold,
            )),
            Mode::Practice {
                chapter_tracking: false,
            } => Completion::Practice(Score::tally(
                finished.total_questions,
                &finished.answers,
                pass_threshold,
            )),
        };

        if let Err(e) = self
            .gateway
            .send_text(finished.conversation, &render::completion(&completion))
            .await
        {
            warn!("Failed to send summary of session {}: {}", finished.session_id, e);
        }

        if let Some(session) = self.sessions.remove_if(participant, finished.session_id) {
            self.release(&session).await;
        }
        let score = completion.score();
        info!(
            "Session {} of participant {} completed: {}/{} correct",
            finished.session_id, participant, score.correct, score.total_questions
        );
    }

    async fn abandon(&self, participant: ParticipantId, session_id: SessionId, delivery: Delivery) {
        error!(
            "Abandoning session {} of participant {}: question could not be delivered",
            session_id, participant
        );
        if let Some(session) = self.sessions.remove_if(participant, session_id) {
            self.release(&session).await;
        }
        if let Err(e) = self
            .gateway
            .send_text(delivery.conversation, render::SESSION_ABANDONED)
            .await
        {
            warn!("Failed to tell {} about the abandoned session: {}", participant, e);
        }
    }

    /// Cancel the timer of a session that is going away and close its open question.
    async fn release(&self, session: &Session) {
        let Some(token) = session.pending() else {
            return;
        };
        self.timers.cancel(session.participant(), token);
        if let Err(e) = self.gateway.close(token).await {
            warn!("Failed to close question {} of session {}: {}", token, session.id(), e);
        }
    }
}
