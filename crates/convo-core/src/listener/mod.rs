//! Event-correlation engine: "send, then wait for the matching reply" and
//! "call me on every matching event until stopped".

pub mod client;
pub mod dispatch;
pub mod identifier;
pub mod record;
pub mod registry;

pub use client::{Answer, ListenOptions, Listeners, PendingListener};
pub use dispatch::DispatchReport;
pub use identifier::{Field, Identifier};
pub use record::{Filter, Listener, ListenerEvent, ListenerId, ListenerType, NextStepHandler};
pub use registry::ListenerRegistry;
