//! Core of the conversational listener engine.
//!
//! This crate is framework-agnostic. Telegram lives behind the messaging port
//! and the `ListenerEvent` trait, implemented in the adapter crate.

pub mod config;
pub mod domain;
pub mod errors;
pub mod listener;
pub mod logging;
pub mod messaging;

pub use errors::{Error, Result};
pub use listener::{
    Answer, DispatchReport, Field, Identifier, ListenOptions, ListenerEvent, ListenerType,
    Listeners,
};
