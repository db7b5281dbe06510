//! Cross-messenger abstractions (Telegram today, other adapters later).

pub mod port;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;
