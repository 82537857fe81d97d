#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use exam_prep_bot::quiz::engine::{QuizEngine, StartRequest};
use exam_prep_bot::quiz::formatter::Prompt;
use exam_prep_bot::quiz::gateway::{Channel, Delivery, GatewayError, MessagingGateway};
use exam_prep_bot::quiz::persistence::{Persistence, StorageError};
use exam_prep_bot::quiz::{
    Answer, ChapterId, ConversationId, Mode, ParticipantId, Question, QuestionId, QuestionToken,
    QuizResult, SessionId,
};
use exam_prep_bot::storage::MemoryStore;

#[derive(Debug, Clone)]
pub struct SentQuestion {
    pub delivery: Delivery,
    pub channel: Channel,
    pub prompt: Prompt,
    pub token: QuestionToken,
}

/// Records everything the engine sends; tokens are `q1`, `q2`, ...
#[derive(Default)]
pub struct FakeGateway {
    attempts: Mutex<Vec<Delivery>>,
    failures_left: Mutex<usize>,
    questions: Mutex<Vec<SentQuestion>>,
    texts: Mutex<Vec<(ConversationId, String)>>,
    edits: Mutex<Vec<(QuestionToken, String)>>,
    closed: Mutex<Vec<QuestionToken>>,
}

impl FakeGateway {
    /// Make the next `n` question sends fail.
    pub fn fail_next_sends(&self, n: usize) {
        *self.failures_left.lock().unwrap() = n;
    }

    pub fn attempts(&self) -> Vec<Delivery> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn questions(&self) -> Vec<SentQuestion> {
        self.questions.lock().unwrap().clone()
    }

    pub fn last_token(&self) -> QuestionToken {
        self.questions.lock().unwrap().last().unwrap().token.clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn edits(&self) -> Vec<(QuestionToken, String)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<QuestionToken> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingGateway for FakeGateway {
    async fn send_question(
        &self,
        delivery: Delivery,
        channel: Channel,
        prompt: &Prompt,
    ) -> Result<QuestionToken, GatewayError> {
        self.attempts.lock().unwrap().push(delivery);
        {
            let mut failures = self.failures_left.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(GatewayError::Delivery("simulated outage".into()));
            }
        }

        let mut questions = self.questions.lock().unwrap();
        let token = QuestionToken::new(format!("q{}", questions.len() + 1));
        questions.push(SentQuestion {
            delivery,
            channel,
            prompt: prompt.clone(),
            token: token.clone(),
        });
        Ok(token)
    }

    async fn send_text(&self, conversation: ConversationId, text: &str) -> Result<(), GatewayError> {
        self.texts.lock().unwrap().push((conversation, text.to_string()));
        Ok(())
    }

    async fn edit_text(&self, token: &QuestionToken, text: &str) -> Result<(), GatewayError> {
        self.edits.lock().unwrap().push((token.clone(), text.to_string()));
        Ok(())
    }

    async fn close(&self, token: &QuestionToken) -> Result<(), GatewayError> {
        self.closed.lock().unwrap().push(token.clone());
        Ok(())
    }
}

/// Loads like `MemoryStore` but cannot write answers.
#[derive(Clone, Default)]
pub struct BrokenAnswerStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl Persistence for BrokenAnswerStore {
    async fn load_questions(&self, chapter: ChapterId) -> Result<Vec<Question>, StorageError> {
        self.inner.load_questions(chapter).await
    }

    async fn save_answer(&self, _answer: &Answer) -> Result<(), StorageError> {
        Err(StorageError::Connection("disk full".into()))
    }

    async fn answers_for_session(&self, session: SessionId) -> Result<Vec<Answer>, StorageError> {
        self.inner.answers_for_session(session).await
    }

    async fn save_result(&self, result: &QuizResult) -> Result<(), StorageError> {
        self.inner.save_result(result).await
    }
}

pub const CHAPTER: ChapterId = ChapterId(1);
pub const EMPTY_CHAPTER: ChapterId = ChapterId(2);
pub const ALICE: ParticipantId = ParticipantId(100);
pub const BOB: ParticipantId = ParticipantId(200);

/// True/false question whose correct option is index 0 (`TRUE`).
pub fn true_question(id: i64, chapter: ChapterId) -> Question {
    Question::true_false(QuestionId(id), chapter, format!("Statement {id}"), true).unwrap()
}

pub fn store_with(chapter: ChapterId, count: i64) -> MemoryStore {
    let store = MemoryStore::new();
    for id in 1..=count {
        store.insert_question(true_question(id, chapter));
    }
    store
}

pub struct Harness {
    pub engine: QuizEngine,
    pub gateway: Arc<FakeGateway>,
    pub store: MemoryStore,
}

pub fn harness(questions: i64) -> Harness {
    let store = store_with(CHAPTER, questions);
    let gateway = Arc::new(FakeGateway::default());
    let engine = QuizEngine::new(gateway.clone(), Arc::new(store.clone())).with_shuffle(false);
    Harness {
        engine,
        gateway,
        store,
    }
}

pub fn request(participant: ParticipantId, mode: Mode, timer_enabled: bool) -> StartRequest {
    StartRequest {
        participant,
        delivery: Delivery {
            conversation: ConversationId(participant.0 as i64),
            reply_to: Some(42),
        },
        chapter: CHAPTER,
        mode,
        timer_enabled,
    }
}

pub fn practice() -> Mode {
    Mode::Practice {
        chapter_tracking: false,
    }
}

pub fn chapter_practice() -> Mode {
    Mode::Practice {
        chapter_tracking: true,
    }
}

/// Position and recorded answers must always agree.
pub fn assert_lockstep(engine: &QuizEngine, participant: ParticipantId) {
    if let Ok(session) = engine.sessions().get(participant) {
        assert_eq!(session.position(), session.answers().len());
    }
}
