//! Client for the homework review-status endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::config::Config;
use crate::error::PollError;

/// Review-status endpoint polled each cycle.
const STATUS_ENDPOINT: &str = "https://practicum.yandex.ru/api/user_api/homework_statuses/";

/// Bound on a single poll round trip so a hung endpoint cannot stall the
/// loop indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of review-status payloads.
///
/// The poll loop talks to the remote service through this seam, so tests
/// can script payload sequences without a network.
#[async_trait]
pub trait StatusApi: Send + Sync {
    /// Fetch the decoded status payload for submissions since `from_date`
    /// (unix seconds).
    async fn fetch(&self, from_date: u64) -> Result<serde_json::Value, PollError>;
}

/// HTTP client for the review-status API.
pub struct StatusClient {
    client: Client,
    endpoint: String,
    token: SecretString,
}

impl StatusClient {
    /// Create a client using the API credential from `config`.
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: STATUS_ENDPOINT.to_string(),
            token: config.practicum_token.clone(),
        }
    }
}

#[async_trait]
impl StatusApi for StatusClient {
    async fn fetch(&self, from_date: u64) -> Result<serde_json::Value, PollError> {
        tracing::debug!(endpoint = %self.endpoint, from_date, "polling review status");

        let response = self
            .client
            .get(&self.endpoint)
            .header(
                "Authorization",
                format!("OAuth {}", self.token.expose_secret()),
            )
            .query(&[("from_date", from_date)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(%status, "review-status endpoint returned an error code");
            return Err(PollError::HttpStatus { status });
        }

        serde_json::from_str(&body).map_err(|e| PollError::Decode {
            reason: e.to_string(),
        })
    }
}
