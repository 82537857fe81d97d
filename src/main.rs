use std::sync::Arc;

use dotenv::dotenv;
use exam_prep_bot::config::Config;
use exam_prep_bot::quiz::engine::{QuizEngine, StartRequest};
use exam_prep_bot::quiz::error::QuizError;
use exam_prep_bot::quiz::gateway::Delivery;
use exam_prep_bot::quiz::intake::{ButtonChannel, PollChannel};
use exam_prep_bot::quiz::render;
use exam_prep_bot::quiz::{ChapterId, ConversationId, Mode, ParticipantId};
use exam_prep_bot::storage::MemoryStore;
use exam_prep_bot::telegram::{self, TelegramGateway};
use log::{debug, warn};
use teloxide::{prelude::*, types::PollAnswer, utils::command::BotCommands};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Exam preparation commands:")]
enum Command {
    #[command(description = "show this text")]
    Help,
    #[command(description = "show this text")]
    Start,
    #[command(description = "take a timed exam, e.g. /exam 3")]
    Exam(i64),
    #[command(description = "timed practice run, e.g. /practice 3")]
    Practice(i64),
    #[command(description = "practice a chapter and get a chapter summary")]
    Chapter(i64),
    #[command(description = "practice without timers")]
    Drill(i64),
    #[command(description = "stop the current quiz")]
    Stop,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting exam prep bot...");

    let config = Config::from_env().expect("Invalid configuration");
    let bot = Bot::from_env();

    log::info!("Loading question bank from {}", config.question_bank.display());
    let store = MemoryStore::open(&config.question_bank).expect("Failed to load the question bank");
    log::info!("Loaded {} questions", store.question_count());

    let engine = QuizEngine::new(
        Arc::new(TelegramGateway::new(bot.clone())),
        Arc::new(store),
    )
    .with_channel(config.channel)
    .with_shuffle(config.shuffle)
    .with_pass_threshold(config.pass_threshold);

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command),
        )
        .branch(Update::filter_message().endpoint(usage_hint))
        .branch(Update::filter_poll_answer().endpoint(poll_answer))
        .branch(Update::filter_callback_query().endpoint(button_press));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![engine])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn command(bot: Bot, engine: QuizEngine, msg: Message, cmd: Command) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let participant = ParticipantId(user.id.0);

    let (chapter, mode, timer_enabled) = match cmd {
        Command::Help | Command::Start => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
            return Ok(());
        }
        Command::Stop => {
            let reply = if engine.stop(participant).await {
                render::SESSION_STOPPED
            } else {
                render::NOTHING_TO_STOP
            };
            bot.send_message(msg.chat.id, reply).await?;
            return Ok(());
        }
        Command::Exam(chapter) => (chapter, Mode::Exam, true),
        Command::Practice(chapter) => (chapter, Mode::Practice { chapter_tracking: false }, true),
        Command::Chapter(chapter) => (chapter, Mode::Practice { chapter_tracking: true }, true),
        Command::Drill(chapter) => (chapter, Mode::Practice { chapter_tracking: false }, false),
    };

    let request = StartRequest {
        participant,
        delivery: Delivery {
            conversation: ConversationId(msg.chat.id.0),
            reply_to: Some(msg.id.0),
        },
        chapter: ChapterId(chapter),
        mode,
        timer_enabled,
    };
    match engine.start(request).await {
        Ok(_) => Ok(()),
        Err(QuizError::EmptyQuestionSet) => {
            bot.send_message(msg.chat.id, render::NO_QUESTIONS).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn usage_hint(bot: Bot, msg: Message) -> HandlerResult {
    if let Some(hint) = msg.text().and_then(render::missing_chapter_hint) {
        bot.send_message(msg.chat.id, hint).await?;
    }
    Ok(())
}

async fn poll_answer(engine: QuizEngine, answer: PollAnswer) -> HandlerResult {
    let outcome = engine.receive(&PollChannel, telegram::poll_vote(answer)).await;
    debug!("Poll answer handled: {:?}", outcome);
    Ok(())
}

async fn button_press(bot: Bot, engine: QuizEngine, query: CallbackQuery) -> HandlerResult {
    // Stop the client's loading spinner; the press still counts if this fails
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!("Failed to acknowledge button press {}: {}", query.id, e);
    }

    if let Some(press) = telegram::button_press(&query) {
        let outcome = engine.receive(&ButtonChannel, press).await;
        debug!("Button press handled: {:?}", outcome);
    }
    Ok(())
}
