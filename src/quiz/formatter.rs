//! Turns stored questions into something a gateway can display.

use super::{OptionLetter, Question, QuestionKind};

pub const DEFAULT_TIMER_SECS: u64 = 60;
pub const EXTENDED_TIMER_SECS: u64 = 120;

// Subjects that get the longer countdown
const EXTENDED_SUBJECTS: [&str; 2] = ["math", "physics"];

/// A question ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub options: Vec<String>,
    /// Stored slot of each displayed option, parallel to `options`.
    pub letters: Vec<OptionLetter>,
    pub correct_index: usize,
    pub timer_seconds: u64,
}

impl Prompt {
    pub fn letter_at(&self, index: usize) -> Option<OptionLetter> {
        self.letters.get(index).copied()
    }

    pub fn correct_option(&self) -> &str {
        self.options
            .get(self.correct_index)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Countdown for a subject. Math and physics get longer.
pub fn timer_seconds(subject: Option<&str>) -> u64 {
    match subject {
        Some(subject) => {
            let subject = subject.trim().to_lowercase();
            if EXTENDED_SUBJECTS.iter().any(|s| subject.contains(s)) {
                EXTENDED_TIMER_SECS
            } else {
                DEFAULT_TIMER_SECS
            }
        }
        None => DEFAULT_TIMER_SECS,
    }
}

/// Builds the prompt for the question at 0-based `position` out of `total`.
pub fn format_question(
    question: &Question,
    position: usize,
    total: usize,
    subject: Option<&str>,
) -> Prompt {
    let text = format!("Question {}/{}\n\n{}", position + 1, total, question.text());

    let (options, letters, correct_index) = match question.kind() {
        QuestionKind::TrueFalse { answer } => (
            vec!["TRUE".to_string(), "FALSE".to_string()],
            vec![OptionLetter::A, OptionLetter::B],
            if *answer { 0 } else { 1 },
        ),
        QuestionKind::MultipleChoice { options, correct } => {
            let populated = OptionLetter::ALL
                .iter()
                .zip(options.iter())
                .filter_map(|(letter, option)| option.as_ref().map(|o| (*letter, o.clone())))
                .collect::<Vec<_>>();
            // Question::multiple_choice guarantees the correct slot is populated
            let correct_index = populated
                .iter()
                .position(|(letter, _)| letter == correct)
                .unwrap_or_default();
            let (letters, options): (Vec<_>, Vec<_>) = populated.into_iter().unzip();
            (options, letters, correct_index)
        }
    };

    Prompt {
        text,
        options,
        letters,
        correct_index,
        timer_seconds: timer_seconds(subject),
    }
}
