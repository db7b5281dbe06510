use std::fmt;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// A chat or user addressed either by numeric id or by `@username`.
///
/// Usernames are stored without the leading `@`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Peer {
    Id(i64),
    Username(String),
}

impl Peer {
    pub fn username(name: impl AsRef<str>) -> Self {
        Peer::Username(name.as_ref().trim_start_matches('@').to_string())
    }

    pub fn as_id(&self) -> Option<i64> {
        match self {
            Peer::Id(id) => Some(*id),
            Peer::Username(_) => None,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Id(id) => write!(f, "{id}"),
            Peer::Username(name) => write!(f, "@{name}"),
        }
    }
}

impl From<i64> for Peer {
    fn from(id: i64) -> Self {
        Peer::Id(id)
    }
}

impl From<ChatId> for Peer {
    fn from(id: ChatId) -> Self {
        Peer::Id(id.0)
    }
}

impl From<UserId> for Peer {
    fn from(id: UserId) -> Self {
        Peer::Id(id.0)
    }
}

impl From<&str> for Peer {
    fn from(name: &str) -> Self {
        Peer::username(name)
    }
}

impl From<String> for Peer {
    fn from(name: String) -> Self {
        Peer::username(name)
    }
}
