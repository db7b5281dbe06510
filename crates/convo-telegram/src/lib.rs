//! Telegram adapter (teloxide).
//!
//! Implements the `convo-core` MessagingPort over the Telegram Bot API and
//! feeds Telegram updates into the listener engine.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, Recipient},
};

use tokio::time::sleep;
use tracing::debug;

pub mod router;
pub mod update;

pub use router::{run_polling, HandlerContext, UpdateHandler};
pub use update::TelegramUpdate;

use convo_core::{
    domain::{ChatId, MessageId, MessageRef, Peer},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::InlineKeyboard,
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn recipient(peer: &Peer) -> Recipient {
        match peer {
            Peer::Id(id) => Recipient::Id(teloxide::types::ChatId(*id)),
            Peer::Username(name) => Recipient::ChannelUsername(format!("@{name}")),
        }
    }

    fn message_ref(msg: &Message) -> MessageRef {
        MessageRef {
            chat_id: ChatId(msg.chat.id.0),
            message_id: MessageId(msg.id.0),
        }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        debug!(?d, "telegram asked to retry later");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(&self, chat: &Peer, text: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::recipient(chat), text.to_string())
            })
            .await?;
        Ok(Self::message_ref(&msg))
    }

    async fn send_inline_keyboard(
        &self,
        chat: &Peer,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
            .buttons
            .into_iter()
            .map(|b| vec![InlineKeyboardButton::callback(b.label, b.callback_data)])
            .collect();
        let markup = InlineKeyboardMarkup::new(rows);

        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::recipient(chat), text.to_string())
                    .reply_markup(markup.clone())
            })
            .await?;
        Ok(Self::message_ref(&msg))
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        self.with_retry(|| {
            let mut req = self
                .bot
                .answer_callback_query(callback_id.to_string())
                .show_alert(show_alert);
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }
}
