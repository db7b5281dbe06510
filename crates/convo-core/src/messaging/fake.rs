use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef, Peer},
    messaging::{
        port::MessagingPort,
        types::InlineKeyboard,
    },
    Error, Result,
};

/// Records outbound calls for assertions.
#[derive(Default)]
pub(crate) struct FakeMessenger {
    next_id: Mutex<i32>,
    pub sends: Mutex<Vec<(Peer, String)>>,
    pub answers: Mutex<Vec<(String, Option<String>, bool)>>,
    pub fail_sends: bool,
}

impl FakeMessenger {
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(Peer, String)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn answered(&self) -> Vec<(String, Option<String>, bool)> {
        self.answers.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send_text(&self, chat: &Peer, text: &str) -> Result<MessageRef> {
        if self.fail_sends {
            return Err(Error::External("send failed".to_string()));
        }
        self.sends
            .lock()
            .unwrap()
            .push((chat.clone(), text.to_string()));
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        Ok(MessageRef {
            chat_id: ChatId(chat.as_id().unwrap_or_default()),
            message_id: MessageId(*id),
        })
    }

    async fn send_inline_keyboard(
        &self,
        chat: &Peer,
        text: &str,
        _keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.send_text(chat, text).await
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        self.answers.lock().unwrap().push((
            callback_id.to_string(),
            text.map(|t| t.to_string()),
            show_alert,
        ));
        Ok(())
    }
}
