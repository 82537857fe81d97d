//! Texts shown to participants.

use super::formatter::Prompt;
use super::scorer::Score;
use super::Answer;

pub const NO_QUESTIONS: &str = "No questions available for this selection.";
pub const SESSION_ABANDONED: &str =
    "Sorry, the next question could not be delivered, so this quiz has been closed. Please start again.";
pub const SESSION_STOPPED: &str = "Quiz stopped.";
pub const NOTHING_TO_STOP: &str = "You have no quiz in progress.";

/// How a finished session is summarized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Completion {
    Chapter(Score),
    Practice(Score),
    Exam(Score),
}

impl Completion {
    pub fn score(&self) -> &Score {
        match self {
            Self::Chapter(score) | Self::Practice(score) | Self::Exam(score) => score,
        }
    }
}

/// Feedback for a resolved question.
pub fn feedback(prompt: &Prompt, answer: &Answer) -> String {
    let correct = format!(
        "{}) {}",
        prompt
            .letter_at(prompt.correct_index)
            .map(|l| l.as_char())
            .unwrap_or('?'),
        prompt.correct_option()
    );
    if answer.is_timeout() {
        format!("⏰ Time's up! The correct answer was {}", correct)
    } else if answer.is_correct {
        "✅ Correct!".to_string()
    } else {
        format!("❌ Wrong. The correct answer was {}", correct)
    }
}

pub fn completion(completion: &Completion) -> String {
    let score = completion.score();
    let stats = format!(
        "Total questions: {}\nCorrect answers: {}\nWrong answers: {}\nScore: {:.1}%",
        score.total_questions, score.correct, score.wrong, score.percentage
    );

    match completion {
        Completion::Chapter(_) => format!("📘 Chapter complete!\n\n{}", stats),
        Completion::Practice(_) => format!("🏁 Practice finished!\n\n{}", stats),
        Completion::Exam(score) => {
            let verdict = if score.passed {
                "🎉 PASSED"
            } else {
                "📚 NOT PASSED, keep practicing"
            };
            format!("📝 Exam finished!\n\n{}\n\n{}", stats, verdict)
        }
    }
}

/// Hint for a quiz command sent without a usable chapter number.
///
/// `None` for anything that is not one of the chapter commands.
pub fn missing_chapter_hint(text: &str) -> Option<String> {
    let command = text.split_whitespace().next()?.strip_prefix('/')?;
    // Group chats address commands as /exam@botname
    let command = command.split('@').next().unwrap_or(command).to_lowercase();
    matches!(command.as_str(), "exam" | "practice" | "chapter" | "drill")
        .then(|| format!("Please add a chapter number, e.g. /{} 1", command))
}
