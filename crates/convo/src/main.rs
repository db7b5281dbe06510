use std::sync::Arc;

use teloxide::Bot;

use convo_core::{config::Config, messaging::port::MessagingPort, Listeners};
use convo_telegram::{TelegramMessenger, TelegramUpdate};

mod demo;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    convo_core::logging::init("convo")?;

    let cfg = Config::load()?;
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let listeners: Listeners<TelegramUpdate> = Listeners::new(messenger, cfg.listener.clone());

    convo_telegram::run_polling(bot, listeners, Arc::new(demo::DemoHandler::default())).await
}
