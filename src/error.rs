//! Error types for the review watcher.

use reqwest::StatusCode;

/// Fatal startup errors. Never retried; the process must not enter the
/// poll loop when configuration is incomplete.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// One or more required environment variables are unset or empty.
    #[error("missing required environment variables: {}", .names.join(", "))]
    Missing { names: Vec<String> },
}

/// Errors raised inside a single poll cycle.
///
/// Every variant is retryable: the loop converts them into operator
/// notifications and keeps running.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The status endpoint could not be reached or the body never arrived.
    #[error("status endpoint unreachable: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    /// The status endpoint answered with a non-success code.
    #[error("status endpoint returned HTTP {status}")]
    HttpStatus { status: StatusCode },

    /// The response body was not valid JSON.
    #[error("response body is not valid JSON: {reason}")]
    Decode { reason: String },

    /// The decoded payload does not match the expected shape.
    #[error("malformed status payload: {reason}")]
    Schema { reason: String },

    /// A homework record carried a status code outside the verdict set.
    #[error("unknown homework status {value:?}")]
    UnknownStatus { value: String },
}

/// Errors raised while delivering a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The notification API could not be reached.
    #[error("notification transport failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },

    /// The notification API answered with a non-success code.
    #[error("notification API returned HTTP {status}")]
    HttpStatus { status: StatusCode },

    /// The notification API accepted the request but rejected the message.
    #[error("notification API rejected the message: {description}")]
    Api { description: String },
}
