use teloxide::types::{CallbackQuery, Message};

use convo_core::{
    domain::{MessageId, Peer},
    listener::{Field, Identifier, ListenerEvent, ListenerType},
    messaging::types::peer_field,
};

/// A Telegram update as seen by the listener engine.
#[derive(Clone, Debug)]
pub enum TelegramUpdate {
    Message(Message),
    CallbackQuery(CallbackQuery),
}

impl TelegramUpdate {
    pub fn message(&self) -> Option<&Message> {
        match self {
            TelegramUpdate::Message(m) => Some(m),
            TelegramUpdate::CallbackQuery(q) => q.message.as_ref(),
        }
    }

    pub fn callback_query(&self) -> Option<&CallbackQuery> {
        match self {
            TelegramUpdate::CallbackQuery(q) => Some(q),
            TelegramUpdate::Message(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            TelegramUpdate::Message(m) => m.text(),
            TelegramUpdate::CallbackQuery(_) => None,
        }
    }

    pub fn callback_data(&self) -> Option<&str> {
        self.callback_query().and_then(|q| q.data.as_deref())
    }

    pub fn chat(&self) -> Option<Peer> {
        self.message().map(|m| Peer::Id(m.chat.id.0))
    }

    /// Sender of the message, or presser of the button.
    pub fn from_user_id(&self) -> Option<u64> {
        match self {
            TelegramUpdate::Message(m) => m.from().map(|u| u.id.0),
            TelegramUpdate::CallbackQuery(q) => Some(q.from.id.0),
        }
    }
}

fn user_field(user: Option<(u64, Option<&str>)>) -> Field<Peer> {
    match user {
        Some((id, username)) => peer_field(Some(id as i64), username),
        None => Field::Any,
    }
}

pub(crate) fn message_identifier(
    chat_id: i64,
    chat_username: Option<&str>,
    user: Option<(u64, Option<&str>)>,
    message_id: i32,
) -> Identifier {
    Identifier {
        from_user_id: user_field(user),
        chat_id: peer_field(Some(chat_id), chat_username),
        message_id: Field::One(MessageId(message_id)),
        inline_message_id: Field::Any,
    }
}

pub(crate) fn callback_identifier(
    presser: (u64, Option<&str>),
    message: Option<(i64, Option<&str>, i32)>,
    inline_message_id: Option<&str>,
) -> Identifier {
    let (chat_id, message_id) = match message {
        Some((chat, chat_username, id)) => (
            peer_field(Some(chat), chat_username),
            Field::One(MessageId(id)),
        ),
        None => (Field::Any, Field::Any),
    };
    Identifier {
        from_user_id: user_field(Some(presser)),
        chat_id,
        message_id,
        inline_message_id: inline_message_id
            .map(|id| Field::One(id.to_string()))
            .unwrap_or_default(),
    }
}

impl ListenerEvent for TelegramUpdate {
    fn listener_type(&self) -> ListenerType {
        match self {
            TelegramUpdate::Message(_) => ListenerType::Message,
            TelegramUpdate::CallbackQuery(_) => ListenerType::CallbackQuery,
        }
    }

    fn identifier(&self) -> Identifier {
        match self {
            TelegramUpdate::Message(m) => message_identifier(
                m.chat.id.0,
                m.chat.username(),
                m.from().map(|u| (u.id.0, u.username.as_deref())),
                m.id.0,
            ),
            TelegramUpdate::CallbackQuery(q) => callback_identifier(
                (q.from.id.0, q.from.username.as_deref()),
                q.message
                    .as_ref()
                    .map(|m| (m.chat.id.0, m.chat.username(), m.id.0)),
                q.inline_message_id.as_deref(),
            ),
        }
    }

    fn callback_query_id(&self) -> Option<&str> {
        self.callback_query().map(|q| q.id.as_str())
    }
}
