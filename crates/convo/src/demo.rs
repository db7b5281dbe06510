//! Demo conversations showing each listener entry point.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use convo_core::{
    domain::Peer,
    messaging::types::InlineKeyboard,
    Identifier, ListenOptions, ListenerType,
};
use convo_telegram::{HandlerContext, TelegramUpdate, UpdateHandler};

const ASK_TIMEOUT: Duration = Duration::from_secs(60);
const PICK_OPTIONS: [&str; 3] = ["Red", "Green", "Blue"];

const HELP: &str = "/name - I ask your name and wait for the reply\n\
/pick - buttons only you can press\n\
/echo - I repeat everything you say until you send /stop\n\
/stop - cancel whatever I'm waiting for in this chat";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Name,
    Pick,
    Echo,
    Stop,
    Help,
}

fn parse_command(text: &str) -> Option<Command> {
    let word = text.split_whitespace().next()?;
    let name = word.strip_prefix('/')?;
    // `/cmd@botname` in groups.
    let name = name.split('@').next().unwrap_or(name);
    match name.to_lowercase().as_str() {
        "name" => Some(Command::Name),
        "pick" => Some(Command::Pick),
        "echo" => Some(Command::Echo),
        "stop" | "cancel" => Some(Command::Stop),
        "start" | "help" => Some(Command::Help),
        _ => None,
    }
}

/// Plain text and `/stop` go to the echo loop; other commands reach the
/// fallback handler as usual.
fn is_echo_input(text: &str) -> bool {
    matches!(parse_command(text), None | Some(Command::Stop))
}

#[derive(Default)]
pub struct DemoHandler;

#[async_trait]
impl UpdateHandler for DemoHandler {
    async fn handle(&self, ctx: HandlerContext, update: TelegramUpdate) -> anyhow::Result<()> {
        let (Some(chat), Some(user)) = (update.chat(), update.from_user_id()) else {
            return Ok(());
        };
        let Some(command) = update.text().and_then(parse_command) else {
            return Ok(());
        };
        let user = Peer::Id(user as i64);

        info!(%chat, %user, ?command, "command");
        match command {
            Command::Name => ask_name(&ctx, chat, user).await,
            Command::Pick => pick(&ctx, chat, user).await,
            Command::Echo => echo(&ctx, chat, user).await,
            Command::Stop => stop(&ctx, chat).await,
            Command::Help => {
                ctx.listeners.messenger().send_text(&chat, HELP).await?;
                Ok(())
            }
        }
    }
}

async fn ask_name(ctx: &HandlerContext, chat: Peer, user: Peer) -> anyhow::Result<()> {
    let messenger = ctx.listeners.messenger();
    let opts = ListenOptions::new()
        .user(user)
        .filter(|u: &TelegramUpdate| u.text().is_some_and(|t| !t.starts_with('/')))
        .timeout(ASK_TIMEOUT);

    match ctx.listeners.ask(chat.clone(), "What's your name?", opts).await {
        Ok(answer) => {
            let name = answer.text().unwrap_or_default().trim().to_string();
            messenger.send_text(&chat, &format!("Nice to meet you, {name}.")).await?;
        }
        Err(e) if e.is_timeout() => {
            messenger.send_text(&chat, "No answer, never mind.").await?;
        }
        Err(e) if e.is_stopped() => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn pick(ctx: &HandlerContext, chat: Peer, user: Peer) -> anyhow::Result<()> {
    let messenger = ctx.listeners.messenger();
    let options: Vec<String> = PICK_OPTIONS.iter().map(|s| s.to_string()).collect();
    let keyboard = InlineKeyboard::one_per_row("pick", &options, 30);
    let sent = messenger
        .send_inline_keyboard(&chat, "Pick a color:", keyboard)
        .await?;

    let owner = user.clone();
    let opts = ListenOptions::new()
        .callback_query()
        .identifier(Identifier::chat(chat.clone()).with_message(sent.message_id))
        .filter(move |u: &TelegramUpdate| {
            u.from_user_id().map(|id| Peer::Id(id as i64)).as_ref() == Some(&owner)
        })
        .unallowed_click_alert(true)
        .timeout(ASK_TIMEOUT);

    match ctx.listeners.listen(opts).await {
        Ok(update) => {
            let choice = update
                .callback_data()
                .and_then(|d| d.strip_prefix("pick:"))
                .and_then(|idx| idx.parse::<usize>().ok())
                .and_then(|idx| options.get(idx).cloned())
                .unwrap_or_else(|| "nothing".to_string());
            if let Some(q) = update.callback_query() {
                let note = format!("You picked {choice}");
                messenger
                    .answer_callback_query(&q.id, Some(note.as_str()), false)
                    .await?;
            }
            messenger
                .send_text(&chat, &format!("{user} picked {choice}."))
                .await?;
        }
        Err(e) if e.is_timeout() => {
            messenger.send_text(&chat, "Nobody picked in time.").await?;
        }
        Err(e) if e.is_stopped() => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn echo(ctx: &HandlerContext, chat: Peer, user: Peer) -> anyhow::Result<()> {
    let messenger = ctx.listeners.messenger();
    let listeners = ctx.listeners.clone();
    let echo_chat = chat.clone();

    ctx.listeners.register_next_step_handler(
        move |update: TelegramUpdate| {
            let messenger = listeners.messenger();
            let listeners = listeners.clone();
            let chat = echo_chat.clone();
            async move {
                let Some(text) = update.text() else {
                    return;
                };
                if parse_command(text) == Some(Command::Stop) {
                    let n = stop_chat(&listeners, &chat);
                    if let Err(e) = messenger
                        .send_text(&chat, &format!("Stopped {n} listener(s)."))
                        .await
                    {
                        tracing::warn!(error = %e, "stop reply failed");
                    }
                    return;
                }
                if let Err(e) = messenger.send_text(&chat, text).await {
                    tracing::warn!(error = %e, "echo failed");
                }
            }
        },
        ListenOptions::new()
            .chat(chat.clone())
            .user(user)
            .filter(|u: &TelegramUpdate| u.text().is_some_and(is_echo_input)),
    );

    messenger
        .send_text(&chat, "Echoing. Send /stop to end.")
        .await?;
    Ok(())
}

fn stop_chat(listeners: &convo_core::Listeners<TelegramUpdate>, chat: &Peer) -> usize {
    let pattern = Identifier::chat(chat.clone());
    listeners.stop_listening(&pattern, ListenerType::Message)
        + listeners.stop_listening(&pattern, ListenerType::CallbackQuery)
}

async fn stop(ctx: &HandlerContext, chat: Peer) -> anyhow::Result<()> {
    let n = stop_chat(&ctx.listeners, &chat);
    ctx.listeners
        .messenger()
        .send_text(&chat, &format!("Stopped {n} listener(s)."))
        .await?;
    Ok(())
}
