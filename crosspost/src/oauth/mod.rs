//! Per-platform OAuth adapters.
//!
//! An adapter is a stateless client implementing the authorization-code
//! exchange and refresh protocol for one platform. Not every platform
//! supports every operation; optional operations default to
//! [`Error::UnsupportedOperation`] and the use cases probe capabilities
//! before calling.
//!
//! Authorization codes and tokens must never be written to log output.

pub mod facebook;
pub mod instagram;
pub mod linkedin;
mod resolver;
pub mod twitter;
pub mod youtube;

pub use resolver::OAuthResolver;

use crate::error::{Error, Result};
use crate::platform::Platform;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use url::Url;

/// Normalized result of a code exchange or token refresh.
///
/// `raw` carries the provider payload only as far as the connect use case,
/// which uses it to discover secondary sub-accounts (pages). It is never
/// persisted verbatim.
#[derive(Debug, Clone)]
pub struct TokenExchangeResult {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds.
    pub expires_in: i64,
    pub scope: Option<String>,
    pub provider_account_id: Option<String>,
    pub raw: Option<serde_json::Value>,
}

impl TokenExchangeResult {
    /// Absolute expiry computed from `expires_in` at call time.
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(self.expires_in)
    }
}

/// One addressable sub-account discovered in an exchange payload (a page,
/// a channel). Consumed only by the connect use case.
#[derive(Debug, Clone)]
pub struct SubAccount {
    pub open_id: String,
    pub display_name: Option<String>,
    /// The sub-account's own access token (page token).
    pub access_token: String,
    /// Sub-account token lifetime when the platform issues longer-lived
    /// tokens per sub-account; `None` inherits the login token's expiry.
    pub expires_in: Option<i64>,
    /// Whether the sub-account carries the linked capability publishing
    /// requires (e.g. a linked Instagram business account).
    pub eligible: bool,
}

#[async_trait]
pub trait OAuthAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Deterministic authorization redirect URL embedding the caller's
    /// opaque anti-CSRF `state` token.
    fn authorization_url(&self, state: &str) -> Result<Url>;

    /// Liveness check. Expected invalid-token responses return `Ok(false)`,
    /// never an error.
    async fn verify_access_token(&self, token: &str) -> Result<bool>;

    fn supports_exchange(&self) -> bool {
        false
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenExchangeResult> {
        Err(Error::UnsupportedOperation {
            platform: self.platform(),
            operation: "code exchange",
        })
    }

    fn supports_refresh(&self) -> bool {
        false
    }

    /// Refresh the given token. Implementations may return no new refresh
    /// token; the caller falls back to the previous one.
    async fn refresh_token(&self, _current: &str) -> Result<TokenExchangeResult> {
        Err(Error::UnsupportedOperation {
            platform: self.platform(),
            operation: "token refresh",
        })
    }

    fn supports_revoke(&self) -> bool {
        false
    }

    /// Best-effort provider-side revocation. Failure never blocks local
    /// credential deletion.
    async fn revoke_token(
        &self,
        _access_token: &str,
        _refresh_token: Option<&str>,
    ) -> Result<bool> {
        Ok(false)
    }

    /// Optional profile enrichment.
    async fn get_profile(
        &self,
        _token: &str,
        _provider_account_id: Option<&str>,
    ) -> Result<serde_json::Value> {
        Err(Error::UnsupportedOperation {
            platform: self.platform(),
            operation: "profile fetch",
        })
    }

    /// Parse sub-accounts out of a raw exchange payload. Empty means the
    /// platform has a single credential per login.
    fn sub_accounts(&self, _raw: &serde_json::Value) -> Vec<SubAccount> {
        Vec::new()
    }
}

impl std::fmt::Debug for dyn OAuthAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthAdapter")
            .field("platform", &self.platform())
            .finish()
    }
}

/// Shared shape of the token endpoint responses across platforms.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

/// Decode a token endpoint response, mapping non-2xx to the given error
/// constructor with the provider's error body.
pub(crate) async fn read_token_response(
    response: reqwest::Response,
    on_error: fn(String) -> Error,
) -> Result<TokenResponse> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(on_error(format!("{status}: {body}")));
    }
    response.json().await.map_err(Error::from)
}
