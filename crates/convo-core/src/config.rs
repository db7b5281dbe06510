use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

pub const DEFAULT_UNALLOWED_CLICK_ALERT_TEXT: &str = "You're not expected to click this button.";

/// Typed configuration for a bot built on the listener engine.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub listener: ListenerConfig,
}

/// Behavior knobs for `listen` / `ask` / dispatch.
#[derive(Clone, Debug)]
pub struct ListenerConfig {
    /// Applied when a `listen` call does not specify its own timeout.
    /// `None` waits forever.
    pub default_timeout: Option<Duration>,
    /// Default for `unallowed_click_alert` on newly built listener options.
    pub unallowed_click_alert: bool,
    /// Text shown to a user who presses a button owned by someone else.
    pub unallowed_click_alert_text: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            default_timeout: None,
            unallowed_click_alert: true,
            unallowed_click_alert_text: DEFAULT_UNALLOWED_CLICK_ALERT_TEXT.to_string(),
        }
    }
}

impl ListenerConfig {
    /// Reads `LISTEN_TIMEOUT_SECS`, `UNALLOWED_CLICK_ALERT` and
    /// `UNALLOWED_CLICK_ALERT_TEXT`. Missing or unparsable values keep defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let default_timeout = env_u64("LISTEN_TIMEOUT_SECS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let unallowed_click_alert =
            env_bool("UNALLOWED_CLICK_ALERT").unwrap_or(defaults.unallowed_click_alert);
        let unallowed_click_alert_text = env_str("UNALLOWED_CLICK_ALERT_TEXT")
            .and_then(non_empty)
            .unwrap_or(defaults.unallowed_click_alert_text);

        Self {
            default_timeout,
            unallowed_click_alert,
            unallowed_click_alert_text,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        Ok(Self {
            telegram_bot_token,
            listener: ListenerConfig::from_env(),
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
