use crate::platform::Platform;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // Resolution errors
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
    #[error("{platform} does not support {operation}")]
    UnsupportedOperation {
        platform: Platform,
        operation: &'static str,
    },

    // OAuth errors
    #[error("code exchange failed: {0}")]
    Exchange(String),
    #[error("token refresh failed: {0}")]
    Refresh(String),
    #[error("{platform} access has expired, please reconnect your {platform} account")]
    ReauthenticationRequired { platform: Platform },
    #[error("{0} account not connected")]
    NotConnected(Platform),

    // Credential errors
    #[error("invalid credential: {}", .0.join(", "))]
    Validation(Vec<String>),

    // Publishing errors (per-target, non-fatal to the batch)
    #[error("publish to {platform} failed: {message}")]
    PublishTarget { platform: Platform, message: String },

    // Storage errors
    #[error("storage error: {0}")]
    Storage(String),

    // Network errors
    #[error("network error: {0}")]
    Network(String),

    // Generic errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}
