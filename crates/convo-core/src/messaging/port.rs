use async_trait::async_trait;

use crate::{
    domain::{MessageRef, Peer},
    messaging::types::InlineKeyboard,
    Result,
};

/// Cross-messenger port.
///
/// The listener engine only needs two things from the outside world: a way to
/// send the question of an `ask`, and a way to answer a button press that a
/// listener refused.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat: &Peer, text: &str) -> Result<MessageRef>;

    async fn send_inline_keyboard(
        &self,
        chat: &Peer,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()>;
}
