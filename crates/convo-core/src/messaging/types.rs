use crate::domain::{ChatId, MessageId, MessageRef, Peer, UserId};
use crate::listener::{Field, Identifier, ListenerEvent, ListenerType};

/// Cross-messenger inbound event model.
///
/// Telegram-specific payloads live in the Telegram adapter; this shape is what
/// non-Telegram adapters (and tests) feed into dispatch.
#[derive(Clone, Debug)]
pub enum InboundEvent {
    Message(TextMessage),
    Callback(CallbackQuery),
}

#[derive(Clone, Debug)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub chat_username: Option<String>,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub message_id: MessageId,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub callback_id: String,
    pub user_id: UserId,
    pub username: Option<String>,
    pub data: String,
    /// Set when the button sits on a regular chat message.
    pub message: Option<MessageRef>,
    /// Set when the button sits on an inline-mode message.
    pub inline_message_id: Option<String>,
}

impl TextMessage {
    pub fn new(chat_id: i64, user_id: i64, message_id: i32, text: &str) -> Self {
        Self {
            chat_id: ChatId(chat_id),
            chat_username: None,
            user_id: Some(UserId(user_id)),
            username: None,
            message_id: MessageId(message_id),
            text: text.to_string(),
        }
    }
}

/// Builds a candidate dimension from an id plus an optional username, so a
/// pattern written with either form matches.
pub fn peer_field(id: Option<i64>, username: Option<&str>) -> Field<Peer> {
    let mut peers = Vec::with_capacity(2);
    if let Some(id) = id {
        peers.push(Peer::Id(id));
    }
    if let Some(name) = username {
        peers.push(Peer::username(name));
    }
    Field::from_values(peers)
}

impl ListenerEvent for InboundEvent {
    fn listener_type(&self) -> ListenerType {
        match self {
            InboundEvent::Message(_) => ListenerType::Message,
            InboundEvent::Callback(_) => ListenerType::CallbackQuery,
        }
    }

    fn identifier(&self) -> Identifier {
        match self {
            InboundEvent::Message(m) => Identifier {
                from_user_id: peer_field(m.user_id.map(|u| u.0), m.username.as_deref()),
                chat_id: peer_field(Some(m.chat_id.0), m.chat_username.as_deref()),
                message_id: Field::One(m.message_id),
                inline_message_id: Field::Any,
            },
            InboundEvent::Callback(q) => Identifier {
                from_user_id: peer_field(Some(q.user_id.0), q.username.as_deref()),
                chat_id: q
                    .message
                    .map(|m| Field::One(Peer::Id(m.chat_id.0)))
                    .unwrap_or_default(),
                message_id: q
                    .message
                    .map(|m| Field::One(m.message_id))
                    .unwrap_or_default(),
                inline_message_id: q
                    .inline_message_id
                    .clone()
                    .map(Field::One)
                    .unwrap_or_default(),
            },
        }
    }

    fn callback_query_id(&self) -> Option<&str> {
        match self {
            InboundEvent::Callback(q) => Some(&q.callback_id),
            InboundEvent::Message(_) => None,
        }
    }
}

/// Inline keyboard (buttons) used for callback-query conversations.
#[derive(Clone, Debug)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn new(buttons: Vec<InlineButton>) -> Self {
        Self { buttons }
    }

    /// Convenience for "one button per row" layouts with `{prefix}:{idx}` data.
    pub fn one_per_row(prefix: &str, options: &[String], max_label_len: usize) -> Self {
        let mut buttons = Vec::new();
        for (idx, opt) in options.iter().enumerate() {
            let label = if opt.chars().count() > max_label_len {
                format!("{}...", opt.chars().take(max_label_len).collect::<String>())
            } else {
                opt.clone()
            };
            let callback_data = format!("{prefix}:{idx}");
            buttons.push(InlineButton {
                label,
                callback_data,
            });
        }
        Self { buttons }
    }
}
