//! Error types for telety
//!
//! Two layers:
//! - [`Error`] is the crate-wide failure type returned by sessions, stores and commands.
//! - [`ProviderError`] is the tagged outcome of a single remote call, which the
//!   paginator switches on to decide between waiting, skipping and aborting.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Session file not found: {0}")]
    SessionNotFound(String),

    #[error("Session is locked by another process")]
    SessionLocked,

    #[error("Failed to acquire session lock: {0}")]
    LockError(String),

    #[error("Telegram API error: {0}")]
    TelegramError(String),

    #[error("Bot API error: {0}")]
    BotError(String),

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Authorization required")]
    AuthorizationRequired,

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<grammers_client::InvocationError> for Error {
    fn from(err: grammers_client::InvocationError) -> Self {
        Error::TelegramError(err.to_string())
    }
}

impl From<teloxide::RequestError> for Error {
    fn from(err: teloxide::RequestError) -> Self {
        Error::BotError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

/// Classified failure of one provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider asked us to wait before calling again.
    #[error("rate limited, retry after {}s", .0.as_secs())]
    Backoff(Duration),

    /// Missing rights or the target is not visible to us. Fatal for the operation.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Anything else. The unit is skipped and counted as failed.
    #[error("{0}")]
    Transient(String),
}

impl ProviderError {
    pub fn backoff_secs(secs: u64) -> Self {
        ProviderError::Backoff(Duration::from_secs(secs))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ProviderError::Permission(_))
    }
}

impl From<Error> for ProviderError {
    fn from(err: Error) -> Self {
        match err {
            Error::AuthorizationRequired => ProviderError::Permission(err.to_string()),
            other => ProviderError::Transient(other.to_string()),
        }
    }
}

/// Extract flood wait seconds from an error string (best-effort)
///
/// Recognises `FLOOD_WAIT_42` style names as well as the `value: 42`
/// rendering of RPC errors.
pub fn parse_flood_wait_seconds(error: &str) -> Option<u64> {
    if let Some(idx) = error.find("FLOOD_WAIT_") {
        let start = idx + "FLOOD_WAIT_".len();
        let secs = error[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>();
        if let Ok(v) = secs.parse::<u64>() {
            return Some(v);
        }
    }

    if error.contains("FLOOD_WAIT") {
        if let Some(idx) = error.find("value:") {
            let start = idx + "value:".len();
            let secs = error[start..]
                .trim_start()
                .trim_start_matches("Some(")
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>();
            if let Ok(v) = secs.parse::<u64>() {
                return Some(v);
            }
        }
    }

    None
}
