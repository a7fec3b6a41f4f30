use crate::error::{Error, Result};
use crate::platform::Platform;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A persisted platform connection: access/refresh token pair plus metadata
/// for one (user, platform, sub-account) triple.
///
/// At most one credential exists per (user_id, platform, open_id); stores
/// overwrite in place rather than duplicating. Created on first successful
/// code exchange, mutated on every refresh or re-connect, deleted on revoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub user_id: String,
    pub platform: Platform,
    pub access_token: String,
    /// Absent on token-reuse platforms, where the access token refreshes
    /// itself; see [`Credential::refresh_source`].
    pub refresh_token: Option<String>,
    /// External sub-account identifier: page id, channel id, account id.
    pub open_id: String,
    /// Human-readable sub-account name (e.g. page name), when known.
    pub display_name: Option<String>,
    /// Granted scopes, space-separated free text.
    pub scope: Option<String>,
    /// Absolute expiry of the access token.
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        user_id: impl Into<String>,
        platform: Platform,
        access_token: impl Into<String>,
        open_id: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            platform,
            access_token: access_token.into(),
            refresh_token: None,
            open_id: open_id.into(),
            display_name: None,
            scope: None,
            expires_at,
            updated_at: Utc::now(),
        }
    }

    /// Whether the access token has already expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Whether the token expires within the lookahead buffer.
    pub fn needs_refresh(&self, buffer_minutes: i64) -> bool {
        self.expires_at < Utc::now() + Duration::minutes(buffer_minutes)
    }

    /// The token to present when refreshing. Platforms without a distinct
    /// refresh token re-exchange the access token itself.
    pub fn refresh_source(&self) -> &str {
        self.refresh_token.as_deref().unwrap_or(&self.access_token)
    }

    /// Validate the assembled credential before persistence, collecting
    /// every violated field.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();
        if self.user_id.trim().is_empty() {
            violations.push("user_id must not be empty".to_string());
        }
        if self.access_token.trim().is_empty() {
            violations.push("access_token must not be empty".to_string());
        }
        if self.open_id.trim().is_empty() {
            violations.push("open_id must not be empty".to_string());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(violations))
        }
    }
}
