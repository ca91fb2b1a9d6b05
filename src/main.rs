mod quiz;

use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use teloxide::{
    dispatching::dialogue::InMemStorage,
    prelude::*,
    types::{ChatId, KeyboardButton, KeyboardMarkup, ParseMode},
};
use tokio::sync::Mutex;

use quiz::loader::QuizLoader;
use quiz::scoring::ScoredResult;
use quiz::selection::Selection;
use quiz::session::{Advance, QuestionView, QuizSession, Tick};
use quiz::{QuizDocument, QuizQuestion, BLANK_MARKER};

type QuizDialogue = Dialogue<State, InMemStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type SharedSession = Arc<Mutex<QuizSession>>;

#[derive(Clone, Default)]
pub enum State {
    #[default]
    Start,
    Welcome { session: SharedSession },
    InProgress { session: SharedSession },
    Results { session: SharedSession },
}

const DEFAULT_API_URL: &str = "http://localhost:3001/data";
const DEFAULT_SECONDS_PER_QUESTION: u32 = 30;

const START_BUTTON: &str = "Start Test";
const SUBMIT_BUTTON: &str = "Submit";
const RESTART_BUTTON: &str = "Try Again";
const CLEAR_PREFIX: &str = "Clear ";
const WORDS_PER_ROW: usize = 3;

#[tokio::main]
async fn main() {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting sentence quiz bot...");

    let api_url =
        std::env::var("QUIZ_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    let seconds_per_question = seconds_per_question_from_env();

    let loader = QuizLoader::new(api_url);
    let document = match loader.load().await {
        Ok(document) => {
            log::info!(
                "Loaded quiz {} with {} question(s)",
                document.test_id,
                document.questions.len()
            );
            Arc::new(document)
        }
        Err(err) => {
            log::error!("Failed to load questions: {err}");
            return;
        }
    };

    let bot = Bot::from_env();
    let storage = InMemStorage::<State>::new();

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, InMemStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, msg: Message| {
                    greet(document.clone(), seconds_per_question, bot, dialogue, msg)
                },
            ))
            .branch(dptree::case![State::Welcome { session }].endpoint(welcome))
            .branch(dptree::case![State::InProgress { session }].endpoint(in_progress))
            .branch(dptree::case![State::Results { session }].endpoint(results)),
    )
    .dependencies(dptree::deps![storage])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

fn seconds_per_question_from_env() -> u32 {
    match std::env::var("SECONDS_PER_QUESTION") {
        Ok(raw) => match raw.parse::<u32>() {
            Ok(seconds) if seconds > 0 => seconds,
            _ => {
                log::warn!(
                    "SECONDS_PER_QUESTION={raw} is not a positive number, \
                     falling back to {DEFAULT_SECONDS_PER_QUESTION}"
                );
                DEFAULT_SECONDS_PER_QUESTION
            }
        },
        Err(_) => DEFAULT_SECONDS_PER_QUESTION,
    }
}

async fn greet(
    document: Arc<QuizDocument>,
    seconds_per_question: u32,
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
) -> HandlerResult {
    let session = Arc::new(Mutex::new(QuizSession::new(document, seconds_per_question)));
    send_welcome_card(&bot, msg.chat.id, &session).await?;
    dialogue.update(State::Welcome { session }).await?;
    Ok(())
}

async fn welcome(
    bot: Bot,
    dialogue: QuizDialogue,
    session: SharedSession,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(START_BUTTON) => {
            let (text, keyboard, epoch) = {
                let mut guard = session.lock().await;
                guard.start()?;
                let view = guard.question_view()?;
                (
                    render_question(&view),
                    question_keyboard(&view),
                    guard.timer_epoch(),
                )
            };
            bot.send_message(msg.chat.id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard)
                .await?;
            dialogue
                .update(State::InProgress {
                    session: session.clone(),
                })
                .await?;
            spawn_countdown(bot, dialogue, session, msg.chat.id, epoch);
        }
        _ => {
            send_welcome_card(&bot, msg.chat.id, &session).await?;
        }
    }
    Ok(())
}

async fn in_progress(
    bot: Bot,
    dialogue: QuizDialogue,
    session: SharedSession,
    msg: Message,
) -> HandlerResult {
    let text = match msg.text() {
        Some(text) => text.trim(),
        None => {
            bot.send_message(msg.chat.id, "Please use the keyboard buttons")
                .await?;
            return Ok(());
        }
    };

    if text == SUBMIT_BUTTON {
        let outcome = { session.lock().await.submit_answer() };
        match outcome {
            Ok(advance) => show_advance(bot, dialogue, session, msg.chat.id, advance).await?,
            Err(err) => {
                bot.send_message(msg.chat.id, err.to_string()).await?;
            }
        }
        return Ok(());
    }

    if let Some(slot) = parse_clear(text) {
        let outcome = { session.lock().await.unselect_slot(slot) };
        match outcome {
            Ok(()) => show_question(&bot, &session, msg.chat.id).await?,
            Err(err) => {
                bot.send_message(msg.chat.id, err.to_string()).await?;
            }
        }
        return Ok(());
    }

    // "2 word" aims a specific blank, replacing whatever is there.
    if let Some((slot, word)) = parse_targeted(text) {
        let outcome = { session.lock().await.select_word(word, slot) };
        match outcome {
            Ok(()) => show_question(&bot, &session, msg.chat.id).await?,
            Err(err) => {
                bot.send_message(msg.chat.id, err.to_string()).await?;
            }
        }
        return Ok(());
    }

    // Anything else is a pick from the word bank, filling the first empty blank.
    let outcome = { session.lock().await.select_first_empty(text) };
    match outcome {
        Ok(true) => show_question(&bot, &session, msg.chat.id).await?,
        Ok(false) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "Every blank is already filled. Clear one first or press “{SUBMIT_BUTTON}”."
                ),
            )
            .await?;
        }
        Err(err) => {
            bot.send_message(msg.chat.id, err.to_string()).await?;
        }
    }
    Ok(())
}

async fn results(
    bot: Bot,
    dialogue: QuizDialogue,
    session: SharedSession,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(RESTART_BUTTON) => {
            {
                session.lock().await.restart();
            }
            send_welcome_card(&bot, msg.chat.id, &session).await?;
            dialogue.update(State::Welcome { session }).await?;
        }
        _ => {
            bot.send_message(
                msg.chat.id,
                format!("Press “{RESTART_BUTTON}” to play the quiz again"),
            )
            .reply_markup(restart_keyboard())
            .await?;
        }
    }
    Ok(())
}

/// Counts the active question down, one second at a time. A submit, restart
/// or earlier expiry moves the session's epoch on, and the next tick comes
/// back stale, so the task dies without touching anything.
fn spawn_countdown(
    bot: Bot,
    dialogue: QuizDialogue,
    session: SharedSession,
    chat_id: ChatId,
    epoch: u64,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let outcome = { session.lock().await.tick(epoch) };
            match outcome {
                Tick::Stale => return,
                Tick::Running { .. } => {}
                Tick::Expired(advance) => {
                    log::debug!("question timed out in chat {chat_id}");
                    if let Err(err) = bot.send_message(chat_id, "⏰ Time is up!").await {
                        log::warn!("failed to announce the timeout in chat {chat_id}: {err}");
                    }
                    if let Err(err) =
                        show_advance(bot, dialogue, session, chat_id, advance).await
                    {
                        log::error!("failed to move on after a timeout in chat {chat_id}: {err}");
                    }
                    return;
                }
            }
        }
    });
}

async fn show_advance(
    bot: Bot,
    dialogue: QuizDialogue,
    session: SharedSession,
    chat_id: ChatId,
    advance: Advance,
) -> HandlerResult {
    match advance {
        Advance::Next { epoch, .. } => {
            show_question(&bot, &session, chat_id).await?;
            spawn_countdown(bot, dialogue, session, chat_id, epoch);
        }
        Advance::Finished => {
            let results = { session.lock().await.results() };
            bot.send_message(chat_id, render_results(&results))
                .parse_mode(ParseMode::Html)
                .reply_markup(restart_keyboard())
                .await?;
            dialogue.update(State::Results { session }).await?;
        }
    }
    Ok(())
}

async fn show_question(bot: &Bot, session: &SharedSession, chat_id: ChatId) -> HandlerResult {
    let (text, keyboard) = {
        let guard = session.lock().await;
        let view = guard.question_view()?;
        (render_question(&view), question_keyboard(&view))
    };
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn send_welcome_card(bot: &Bot, chat_id: ChatId, session: &SharedSession) -> HandlerResult {
    let (total, seconds) = {
        let guard = session.lock().await;
        (guard.total_questions(), guard.seconds_per_question())
    };
    bot.send_message(chat_id, render_welcome(total, seconds))
        .parse_mode(ParseMode::Html)
        .reply_markup(KeyboardMarkup::new(vec![vec![KeyboardButton::new(
            START_BUTTON,
        )]]))
        .await?;
    Ok(())
}

fn parse_clear(text: &str) -> Option<usize> {
    text.strip_prefix(CLEAR_PREFIX)?
        .trim()
        .parse::<usize>()
        .ok()?
        .checked_sub(1)
}

fn parse_targeted(text: &str) -> Option<(usize, &str)> {
    let (number, word) = text.split_once(' ')?;
    let slot = number.parse::<usize>().ok()?.checked_sub(1)?;
    let word = word.trim();
    if word.is_empty() {
        return None;
    }
    Some((slot, word))
}

fn restart_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(RESTART_BUTTON)]])
}

fn question_keyboard(view: &QuestionView<'_>) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = view
        .selection
        .available_words()
        .chunks(WORDS_PER_ROW)
        .map(|chunk| {
            chunk
                .iter()
                .map(|word| KeyboardButton::new(word.clone()))
                .collect()
        })
        .collect();

    let clear_row: Vec<KeyboardButton> = view
        .selection
        .slots()
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_some())
        .map(|(index, _)| KeyboardButton::new(format!("{CLEAR_PREFIX}{}", index + 1)))
        .collect();
    if !clear_row.is_empty() {
        rows.push(clear_row);
    }

    if view.selection.is_complete() {
        rows.push(vec![KeyboardButton::new(SUBMIT_BUTTON)]);
    }

    KeyboardMarkup::new(rows)
}

fn render_welcome(total_questions: usize, seconds_per_question: u32) -> String {
    format!(
        "<b>Sentence Construction</b>\n\n\
         Select the correct words to complete the sentence by arranging \
         the provided options in the right order.\n\n\
         Time per question: <b>{seconds_per_question} sec</b>\n\
         Total questions: <b>{total_questions}</b>\n\n\
         Press “{START_BUTTON}” when you are ready."
    )
}

fn render_question(view: &QuestionView<'_>) -> String {
    let legend = view
        .selection
        .slots()
        .iter()
        .enumerate()
        .map(|(index, slot)| match slot {
            Some(word) => format!("{}. {}", index + 1, word),
            None => format!("{}. ______", index + 1),
        })
        .collect::<Vec<_>>()
        .join("   ");

    format!(
        "<b>Question {}/{}</b>  ⏱ {}s\n\n\
         Fill in the blanks with the appropriate words:\n\n{}\n\n{}\n\n\
         <i>Tap a word to fill the next blank, or send “2 word” to aim blank 2.</i>",
        view.index + 1,
        view.total,
        view.time_remaining,
        render_sentence(view.question, view.selection),
        legend,
    )
}

/// Interleaves the user's picks into the sentence, one per blank marker.
fn render_sentence(question: &QuizQuestion, selection: &Selection) -> String {
    let mut rendered = String::new();
    let mut slots = selection.slots().iter();
    let mut parts = question.question.split(BLANK_MARKER).peekable();
    while let Some(part) = parts.next() {
        rendered.push_str(part);
        if parts.peek().is_some() {
            match slots.next().and_then(|slot| slot.as_deref()) {
                Some(word) => {
                    rendered.push_str("<b><u>");
                    rendered.push_str(word);
                    rendered.push_str("</u></b>");
                }
                None => rendered.push_str("______"),
            }
        }
    }
    rendered
}

fn render_results(results: &ScoredResult) -> String {
    let mut text = format!(
        "<b>Quiz Results</b>\n\n\
         <b>{}%</b> — you got {} out of {} questions correct\n{}\n",
        results.percentage,
        results.score,
        results.total_questions,
        feedback(results.percentage),
    );

    for (index, entry) in results.per_question.iter().enumerate() {
        let mark = if entry.is_correct { "✅" } else { "❌" };
        text.push_str(&format!(
            "\n{} <b>Question {}</b>\n{}\n",
            mark,
            index + 1,
            entry.question_text
        ));
        match &entry.user_answer {
            Some(words) => text.push_str(&format!("Your answer: {}\n", words.join(" "))),
            None => text.push_str("Your answer: no answer given\n"),
        }
        if !entry.is_correct {
            text.push_str(&format!(
                "Correct answer: {}\n",
                entry.correct_answer.join(" ")
            ));
        }
    }
    text
}

fn feedback(percentage: u32) -> &'static str {
    if percentage >= 80 {
        "Excellent work! You've mastered these sentences!"
    } else if percentage >= 50 {
        "Good effort! Keep practicing to improve further."
    } else {
        "Keep practicing! Review your answers below to learn from your mistakes."
    }
}
