use std::sync::Arc;

use async_trait::async_trait;
use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::CallbackQuery};
use tracing::{info, warn};

use convo_core::Listeners;

use crate::update::TelegramUpdate;

/// What an application handler gets for each update no listener claimed.
#[derive(Clone)]
pub struct HandlerContext {
    pub bot: Bot,
    pub listeners: Listeners<TelegramUpdate>,
}

/// Application-level handler for updates that passed through dispatch unclaimed.
///
/// Runs on its own task, so it may `ask` and wait for a reply that arrives
/// through the same chat.
#[async_trait]
pub trait UpdateHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: HandlerContext, update: TelegramUpdate) -> anyhow::Result<()>;
}

struct RouterState {
    listeners: Listeners<TelegramUpdate>,
    fallback: Arc<dyn UpdateHandler>,
}

pub async fn run_polling(
    bot: Bot,
    listeners: Listeners<TelegramUpdate>,
    fallback: Arc<dyn UpdateHandler>,
) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "bot started"),
        Err(e) => warn!(error = %e, "getMe failed; polling anyway"),
    }

    let state = Arc::new(RouterState {
        listeners,
        fallback,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(on_callback_query))
        .branch(Update::filter_message().endpoint(on_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn on_message(bot: Bot, msg: Message, state: Arc<RouterState>) -> ResponseResult<()> {
    route(bot, TelegramUpdate::Message(msg), state).await;
    Ok(())
}

async fn on_callback_query(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<RouterState>,
) -> ResponseResult<()> {
    route(bot, TelegramUpdate::CallbackQuery(q), state).await;
    Ok(())
}

async fn route(bot: Bot, update: TelegramUpdate, state: Arc<RouterState>) {
    let report = state.listeners.dispatch(&update).await;
    if report.is_consumed() {
        return;
    }

    let ctx = HandlerContext {
        bot,
        listeners: state.listeners.clone(),
    };
    let fallback = state.fallback.clone();
    tokio::spawn(async move {
        if let Err(e) = fallback.handle(ctx, update).await {
            warn!(error = %e, "update handler failed");
        }
    });
}
