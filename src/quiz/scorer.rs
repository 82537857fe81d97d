use std::sync::Arc;

use chrono::Utc;
use log::{error, info};

use super::persistence::Persistence;
use super::{Answer, ChapterId, ParticipantId, QuizResult, SessionId};

pub const DEFAULT_PASS_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub total_questions: usize,
    pub correct: usize,
    /// Wrong selections, time-outs and unrecorded answers.
    pub wrong: usize,
    pub percentage: f64,
    pub passed: bool,
}

impl Score {
    pub fn tally<'a>(
        total_questions: usize,
        answers: impl IntoIterator<Item = &'a Answer>,
        pass_threshold: f64,
    ) -> Self {
        let correct = answers
            .into_iter()
            .filter(|a| a.is_correct)
            .count()
            .min(total_questions);
        let percentage = if total_questions == 0 {
            0.0
        } else {
            correct as f64 / total_questions as f64 * 100.0
        };

        Self {
            total_questions,
            correct,
            wrong: total_questions - correct,
            percentage,
            passed: percentage >= pass_threshold,
        }
    }
}

/// Scores finished exams from persisted answers and stores the result.
#[derive(Clone)]
pub struct Scorer {
    persistence: Arc<dyn Persistence>,
    pass_threshold: f64,
}

impl Scorer {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self {
            persistence,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_pass_threshold(mut self, pass_threshold: f64) -> Self {
        self.pass_threshold = pass_threshold;
        self
    }

    pub fn pass_threshold(&self) -> f64 {
        self.pass_threshold
    }

    /// Score the session and persist one `QuizResult` for it.
    ///
    /// Storage failures are logged; the score then covers whatever could be read.
    pub async fn finalize(
        &self,
        participant: ParticipantId,
        exam: ChapterId,
        session: SessionId,
        total_questions: usize,
    ) -> Score {
        let answers = match self.persistence.answers_for_session(session).await {
            Ok(answers) => answers,
            Err(e) => {
                error!("Failed to load answers of session {}: {}", session, e);
                Vec::new()
            }
        };
        let score = Score::tally(total_questions, &answers, self.pass_threshold);

        let result = QuizResult {
            participant,
            chapter_id: exam,
            session_id: session,
            score: score.correct,
            percentage: score.percentage,
            completed_at: Utc::now(),
        };
        match self.persistence.save_result(&result).await {
            Ok(()) => info!(
                "Participant {} finished exam {:?}: {}/{} ({:.1}%)",
                participant, exam, score.correct, total_questions, score.percentage
            ),
            Err(e) => error!("Failed to save result of session {}: {}", session, e),
        }

        score
    }
}
