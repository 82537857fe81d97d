//! Normalizes platform answer events into [`AnswerEvent`]s.
//!
//! Each presentation channel has a thin adapter that only knows its own
//! payload shape. Everything after decoding is shared, see
//! [`QuizEngine::receive`](super::engine::QuizEngine::receive).

use super::{ParticipantId, QuestionToken};

const BUTTON_PREFIX: &str = "ans";

/// "Participant picked option `selected_index` of the question behind `token`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerEvent {
    pub participant: ParticipantId,
    pub token: QuestionToken,
    pub selected_index: usize,
}

/// What happened to an inbound answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Accepted,
    /// The participant is not in a session.
    NoActiveSession,
    /// Not the question the session is waiting on (late, duplicate or already timed out).
    StaleToken,
    /// The selected index is not one of the displayed options.
    InvalidOption,
    /// The payload could not be decoded.
    Unrecognized,
}

pub trait AnswerChannel {
    type Raw;

    fn decode(&self, raw: Self::Raw) -> Option<AnswerEvent>;
}

/// A vote on a non-anonymous poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollVote {
    pub voter: ParticipantId,
    pub poll_id: String,
    /// Empty when the vote was retracted.
    pub option_ids: Vec<usize>,
}

/// Questions shown as polls; the poll id is the token.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollChannel;

impl AnswerChannel for PollChannel {
    type Raw = PollVote;

    fn decode(&self, vote: PollVote) -> Option<AnswerEvent> {
        let selected_index = *vote.option_ids.first()?;
        Some(AnswerEvent {
            participant: vote.voter,
            token: QuestionToken::new(vote.poll_id),
            selected_index,
        })
    }
}

/// A press on an inline answer button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPress {
    pub presser: ParticipantId,
    pub data: String,
}

/// Questions shown with one button per option.
///
/// Button payloads look like `ans:<token>:<index>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ButtonChannel;

impl ButtonChannel {
    pub fn encode(token: &QuestionToken, index: usize) -> String {
        format!("{}:{}:{}", BUTTON_PREFIX, token, index)
    }
}

impl AnswerChannel for ButtonChannel {
    type Raw = ButtonPress;

    fn decode(&self, press: ButtonPress) -> Option<AnswerEvent> {
        let rest = press.data.strip_prefix(BUTTON_PREFIX)?.strip_prefix(':')?;
        let (token, index) = rest.rsplit_once(':')?;
        if token.is_empty() {
            return None;
        }
        Some(AnswerEvent {
            participant: press.presser,
            token: QuestionToken::new(token),
            selected_index: index.parse().ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_vote_uses_first_option() {
        let event = PollChannel
            .decode(PollVote {
                voter: ParticipantId(4),
                poll_id: "5012".into(),
                option_ids: vec![2],
            })
            .unwrap();

        assert_eq!(event.participant, ParticipantId(4));
        assert_eq!(event.token, QuestionToken::new("5012"));
        assert_eq!(event.selected_index, 2);
    }

    #[test]
    fn retracted_vote_is_ignored() {
        let vote = PollVote {
            voter: ParticipantId(4),
            poll_id: "5012".into(),
            option_ids: vec![],
        };
        assert!(PollChannel.decode(vote).is_none());
    }

    #[test]
    fn button_payload_decodes_what_encode_produced() {
        let token = QuestionToken::generate();
        let press = ButtonPress {
            presser: ParticipantId(9),
            data: ButtonChannel::encode(&token, 3),
        };

        let event = ButtonChannel.decode(press).unwrap();
        assert_eq!(event.token, token);
        assert_eq!(event.selected_index, 3);
        assert_eq!(event.participant, ParticipantId(9));
    }

    #[test]
    fn foreign_button_payloads_are_ignored() {
        for data in ["practice_course_3", "ans:abc", "ans::1", "ans:abc:x", "answer_5_B"] {
            let press = ButtonPress {
                presser: ParticipantId(1),
                data: data.to_string(),
            };
            assert!(ButtonChannel.decode(press).is_none(), "{data}");
        }
    }
}
