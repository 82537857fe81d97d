//! Telegram implementation of the messaging gateway.

use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, PollAnswer};
use teloxide::RequestError;

use crate::quiz::formatter::Prompt;
use crate::quiz::gateway::{Channel, Delivery, GatewayError, MessagingGateway};
use crate::quiz::intake::{ButtonChannel, ButtonPress, PollVote};
use crate::quiz::{ConversationId, ParticipantId, QuestionToken};

// Telegram limits for poll questions and options
const POLL_QUESTION_LIMIT: usize = 300;
const POLL_OPTION_LIMIT: usize = 100;

impl From<RequestError> for GatewayError {
    fn from(e: RequestError) -> Self {
        GatewayError::Delivery(e.to_string())
    }
}

struct Displayed {
    chat: ChatId,
    message: MessageId,
    channel: Channel,
    text: String,
}

pub struct TelegramGateway {
    bot: Bot,
    displayed: DashMap<QuestionToken, Displayed>,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self {
            bot,
            displayed: DashMap::new(),
        }
    }

    fn remember(&self, token: QuestionToken, displayed: Displayed) {
        self.displayed.insert(token, displayed);
    }

    fn forget(&self, token: &QuestionToken) -> Result<Displayed, GatewayError> {
        self.displayed
            .remove(token)
            .map(|(_, displayed)| displayed)
            .ok_or_else(|| GatewayError::UnknownToken(token.clone()))
    }

    async fn send_poll(&self, delivery: Delivery, prompt: &Prompt) -> Result<QuestionToken, GatewayError> {
        let chat = ChatId(delivery.conversation.0);
        let options = prompt
            .options
            .iter()
            .map(|o| truncate(o, POLL_OPTION_LIMIT))
            .collect::<Vec<_>>();

        let mut request = self
            .bot
            .send_poll(chat, truncate(&prompt.text, POLL_QUESTION_LIMIT), options)
            .is_anonymous(false);
        if let Some(id) = delivery.reply_to {
            request = request.reply_to_message_id(MessageId(id));
        }
        let message = request.await?;

        let poll = message
            .poll()
            .ok_or_else(|| GatewayError::Delivery("sent message carries no poll".to_string()))?;
        let token = QuestionToken::new(poll.id.clone());
        self.remember(
            token.clone(),
            Displayed {
                chat,
                message: message.id,
                channel: Channel::Poll,
                text: prompt.text.clone(),
            },
        );
        Ok(token)
    }

    async fn send_buttons(&self, delivery: Delivery, prompt: &Prompt) -> Result<QuestionToken, GatewayError> {
        let chat = ChatId(delivery.conversation.0);
        let token = QuestionToken::generate();

        let listing = prompt
            .options
            .iter()
            .zip(&prompt.letters)
            .map(|(option, letter)| format!("{}) {}", letter, option))
            .collect::<Vec<_>>()
            .join("\n");
        let text = format!("{}\n\n{}", prompt.text, listing);

        let keyboard = InlineKeyboardMarkup::new(prompt.letters.iter().enumerate().map(
            |(index, letter)| {
                vec![InlineKeyboardButton::callback(
                    letter.to_string(),
                    ButtonChannel::encode(&token, index),
                )]
            },
        ));

        let mut request = self.bot.send_message(chat, text.clone()).reply_markup(keyboard);
        if let Some(id) = delivery.reply_to {
            request = request.reply_to_message_id(MessageId(id));
        }
        let message = request.await?;

        self.remember(
            token.clone(),
            Displayed {
                chat,
                message: message.id,
                channel: Channel::Buttons,
                text,
            },
        );
        Ok(token)
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send_question(
        &self,
        delivery: Delivery,
        channel: Channel,
        prompt: &Prompt,
    ) -> Result<QuestionToken, GatewayError> {
        match channel {
            Channel::Poll => self.send_poll(delivery, prompt).await,
            Channel::Buttons => self.send_buttons(delivery, prompt).await,
        }
    }

    async fn send_text(&self, conversation: ConversationId, text: &str) -> Result<(), GatewayError> {
        self.bot.send_message(ChatId(conversation.0), text).await?;
        Ok(())
    }

    async fn edit_text(&self, token: &QuestionToken, text: &str) -> Result<(), GatewayError> {
        let displayed = self.forget(token)?;

        match displayed.channel {
            Channel::Poll => {
                // Polls cannot be edited, close it and reply underneath instead
                if let Err(e) = self.bot.stop_poll(displayed.chat, displayed.message).await {
                    debug!("Could not stop poll {}: {}", token, e);
                }
                self.bot
                    .send_message(displayed.chat, text)
                    .reply_to_message_id(displayed.message)
                    .await?;
            }
            Channel::Buttons => {
                // Editing without a reply markup also drops the answer buttons
                self.bot
                    .edit_message_text(
                        displayed.chat,
                        displayed.message,
                        format!("{}\n\n{}", displayed.text, text),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn close(&self, token: &QuestionToken) -> Result<(), GatewayError> {
        let displayed = self.forget(token)?;
        match displayed.channel {
            Channel::Poll => {
                self.bot.stop_poll(displayed.chat, displayed.message).await?;
            }
            Channel::Buttons => {
                // No markup in the request removes the keyboard
                self.bot
                    .edit_message_reply_markup(displayed.chat, displayed.message)
                    .await?;
            }
        }
        debug!("Closed question {}", token);
        Ok(())
    }
}

pub fn poll_vote(answer: PollAnswer) -> PollVote {
    PollVote {
        voter: ParticipantId(answer.user.id.0),
        poll_id: answer.poll_id,
        option_ids: answer
            .option_ids
            .iter()
            .filter_map(|&i| usize::try_from(i).ok())
            .collect(),
    }
}

pub fn button_press(query: &CallbackQuery) -> Option<ButtonPress> {
    Some(ButtonPress {
        presser: ParticipantId(query.from.id.0),
        data: query.data.clone()?,
    })
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated = text.chars().take(limit - 1).collect::<String>();
    truncated.push('…');
    truncated
}
