use std::time::Duration;

/// Core error type.
///
/// Adapter crates should map their specific errors into this type so callers of
/// `listen` / `ask` see one consistent set of outcomes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("external error: {0}")]
    External(String),

    /// The listener was not fulfilled within the requested window.
    #[error("listener timed out after {timeout:?}")]
    ListenerTimeout { timeout: Duration },

    /// The listener was stopped (`stop_listening`) or its waiter was cancelled.
    #[error("listener stopped")]
    ListenerStopped,

    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ListenerTimeout { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Error::ListenerStopped)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
