//! In-memory persistence backed by a JSON question bank.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;

use crate::quiz::persistence::{Persistence, StorageError};
use crate::quiz::{
    Answer, ChapterId, OptionLetter, Question, QuestionError, QuestionId, QuizResult, SessionId,
};

#[derive(Debug, Deserialize)]
struct QuestionRecord {
    id: i64,
    chapter_id: i64,
    #[serde(default)]
    subject: Option<String>,
    text: String,
    #[serde(flatten)]
    kind: KindRecord,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum KindRecord {
    TrueFalse {
        answer: bool,
    },
    MultipleChoice {
        // Slots A-D in order, "" for an empty slot
        options: Vec<String>,
        correct: OptionLetter,
    },
}

impl QuestionRecord {
    fn into_question(self) -> Result<Question, StorageError> {
        let invalid = |e: QuestionError| {
            StorageError::Serialization(format!("question {}: {}", self.id, e))
        };
        let id = QuestionId(self.id);
        let chapter = ChapterId(self.chapter_id);

        let question = match self.kind {
            KindRecord::TrueFalse { answer } => {
                Question::true_false(id, chapter, self.text.clone(), answer).map_err(invalid)?
            }
            KindRecord::MultipleChoice { options, correct } => {
                if options.len() > OptionLetter::ALL.len() {
                    return Err(StorageError::Serialization(format!(
                        "question {}: {} options, at most 4 allowed",
                        self.id,
                        options.len()
                    )));
                }
                let mut slots: [Option<String>; 4] = Default::default();
                for (slot, option) in slots.iter_mut().zip(options) {
                    *slot = Some(option);
                }
                Question::multiple_choice(id, chapter, self.text.clone(), slots, correct)
                    .map_err(invalid)?
            }
        };

        Ok(match self.subject {
            Some(subject) => question.with_subject(subject),
            None => question,
        })
    }
}

/// Keeps questions, answers and results in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    questions: Arc<Mutex<HashMap<ChapterId, Vec<Question>>>>,
    answers: Arc<Mutex<Vec<Answer>>>,
    results: Arc<Mutex<Vec<QuizResult>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a question bank file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the file cannot be read or holds an invalid question.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| StorageError::Connection(format!("{}: {}", path.display(), e)))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse a JSON array of question records.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for malformed JSON or invalid questions.
    pub fn from_reader(reader: impl Read) -> Result<Self, StorageError> {
        let records: Vec<QuestionRecord> = serde_json::from_reader(reader)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let store = Self::new();
        for record in records {
            store.insert_question(record.into_question()?);
        }
        Ok(store)
    }

    pub fn insert_question(&self, question: Question) {
        let mut questions = self.questions.lock().unwrap_or_else(|e| e.into_inner());
        questions
            .entry(question.chapter_id())
            .or_default()
            .push(question);
    }

    pub fn question_count(&self) -> usize {
        let questions = self.questions.lock().unwrap_or_else(|e| e.into_inner());
        questions.values().map(Vec::len).sum()
    }

    pub fn answers(&self) -> Vec<Answer> {
        self.answers.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn results(&self) -> Vec<QuizResult> {
        self.results.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    async fn load_questions(&self, chapter: ChapterId) -> Result<Vec<Question>, StorageError> {
        let guard = self
            .questions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&chapter).cloned().unwrap_or_default())
    }

    async fn save_answer(&self, answer: &Answer) -> Result<(), StorageError> {
        let mut guard = self
            .answers
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(answer.clone());
        Ok(())
    }

    async fn answers_for_session(&self, session: SessionId) -> Result<Vec<Answer>, StorageError> {
        let guard = self
            .answers
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .filter(|a| a.session_id == session)
            .cloned()
            .collect())
    }

    async fn save_result(&self, result: &QuizResult) -> Result<(), StorageError> {
        let mut guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuestionKind;

    const BANK: &str = r#"[
        {"id": 1, "chapter_id": 3, "subject": "Physics", "text": "Light is a wave", "kind": "true_false", "answer": true},
        {"id": 2, "chapter_id": 3, "text": "2 + 2?", "kind": "multiple_choice", "options": ["3", "", "4"], "correct": "C"},
        {"id": 3, "chapter_id": 4, "text": "Capital of France?", "kind": "multiple_choice", "options": ["Paris", "Rome"], "correct": "A"}
    ]"#;

    #[tokio::test]
    async fn loads_questions_by_chapter() {
        let store = MemoryStore::from_reader(BANK.as_bytes()).unwrap();
        assert_eq!(store.question_count(), 3);

        let chapter = store.load_questions(ChapterId(3)).await.unwrap();
        assert_eq!(chapter.len(), 2);
        assert_eq!(chapter[0].subject(), Some("Physics"));
        match chapter[1].kind() {
            QuestionKind::MultipleChoice { options, correct } => {
                assert_eq!(*correct, OptionLetter::C);
                assert_eq!(options[1], None);
                assert_eq!(options[3], None);
            }
            other => panic!("unexpected kind {other:?}"),
        }

        assert!(store.load_questions(ChapterId(99)).await.unwrap().is_empty());
    }

    #[test]
    fn rejects_correct_answer_in_empty_slot() {
        let bank = r#"[{"id": 7, "chapter_id": 1, "text": "?", "kind": "multiple_choice", "options": ["a", "b", ""], "correct": "C"}]"#;
        let err = MemoryStore::from_reader(bank.as_bytes()).err().unwrap();
        assert!(matches!(err, StorageError::Serialization(msg) if msg.contains("question 7")));
    }

    #[test]
    fn rejects_too_many_options() {
        let bank = r#"[{"id": 8, "chapter_id": 1, "text": "?", "kind": "multiple_choice", "options": ["a", "b", "c", "d", "e"], "correct": "A"}]"#;
        assert!(MemoryStore::from_reader(bank.as_bytes()).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            MemoryStore::from_reader("{not json".as_bytes()),
            Err(StorageError::Serialization(_))
        ));
    }
}
