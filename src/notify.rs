//! Notification delivery to the fixed Telegram chat.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::Config;
use crate::error::NotifyError;

/// Telegram Bot API base URL.
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Bound on one delivery round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Capability to send a text message to the fixed destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text` to the destination. An `Err` means the message did
    /// not arrive and the caller may retry on a later cycle.
    async fn deliver(&self, text: &str) -> Result<(), NotifyError>;
}

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Notifier backed by the Telegram Bot API `sendMessage` method.
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    token: SecretString,
    chat_id: String,
}

impl TelegramNotifier {
    /// Create a notifier for the chat configured in `config`.
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: TELEGRAM_API_BASE.to_string(),
            token: config.telegram_token.clone(),
            chat_id: config.telegram_chat_id.clone(),
        }
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.base_url.trim_end_matches('/'),
            self.token.expose_secret()
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, text: &str) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });

        let response = self
            .client
            .post(self.send_message_url())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::HttpStatus { status });
        }

        let body: ApiResponse = response.json().await?;
        if !body.ok {
            return Err(NotifyError::Api {
                description: body.description.unwrap_or_else(|| "unknown".to_string()),
            });
        }

        tracing::debug!("bot delivered message: {:?}", text);
        Ok(())
    }
}
