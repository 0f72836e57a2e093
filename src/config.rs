//! Process configuration.
//!
//! All inputs arrive through the environment. They are validated once at
//! startup and travel as an explicit [`Config`] value from then on; nothing
//! else in the crate reads the environment.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Validated startup configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OAuth token for the review-status API.
    pub practicum_token: SecretString,
    /// Telegram bot token.
    pub telegram_token: SecretString,
    /// Chat that receives notifications.
    pub telegram_chat_id: String,
}

impl Config {
    /// Read the configuration from the process environment.
    ///
    /// Fails with [`ConfigError::Missing`] listing every variable that is
    /// unset or empty; the caller must not start the poll loop in that case.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut require = |name: &str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => value,
            _ => {
                missing.push(name.to_string());
                String::new()
            }
        };

        let practicum_token = require("PRACTICUM_TOKEN");
        let telegram_token = require("TELEGRAM_TOKEN");
        let telegram_chat_id = require("TELEGRAM_CHAT_ID");

        if !missing.is_empty() {
            return Err(ConfigError::Missing { names: missing });
        }

        Ok(Self {
            practicum_token: practicum_token.into(),
            telegram_token: telegram_token.into(),
            telegram_chat_id,
        })
    }
}
