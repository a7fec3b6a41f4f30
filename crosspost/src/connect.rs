//! Account lifecycle use cases: connect, refresh, revoke.
//!
//! These sit directly under the route layer, so they never surface a raw
//! error: every failure becomes a structured result with a user-facing
//! message.

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::oauth::OAuthResolver;
use crate::platform::Platform;
use crate::store::{CredentialStore, JobScheduler, RefreshedToken};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How far ahead of expiry the scheduled re-check fires.
const EXPIRY_RECHECK_DELAY: Duration = Duration::from_secs(24 * 3600);

#[derive(Debug, Clone, Serialize)]
pub struct ConnectResult {
    pub success: bool,
    pub message: String,
    /// The first persisted credential (multi-page connects persist several).
    pub credential: Option<Credential>,
    /// Raw exchange payload for caller-side UI (page selection). Never
    /// persisted.
    pub raw: Option<serde_json::Value>,
}

impl ConnectResult {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            credential: None,
            raw: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResult {
    pub success: bool,
    pub message: String,
    pub credential: Option<Credential>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevokeResult {
    pub success: bool,
    pub message: String,
    /// Whether the provider-side revoke went through. Informational only;
    /// the local disconnect is the contract's real guarantee.
    pub provider_revoked: bool,
}

pub struct AccountUseCases {
    resolver: Arc<OAuthResolver>,
    credentials: Arc<dyn CredentialStore>,
    scheduler: Arc<dyn JobScheduler>,
}

impl AccountUseCases {
    pub fn new(
        resolver: Arc<OAuthResolver>,
        credentials: Arc<dyn CredentialStore>,
        scheduler: Arc<dyn JobScheduler>,
    ) -> Self {
        Self {
            resolver,
            credentials,
            scheduler,
        }
    }

    /// The authorization redirect URL for a platform, embedding the
    /// caller's anti-CSRF state token.
    pub fn authorization_url(&self, platform: Platform, state: &str) -> Result<url::Url> {
        self.resolver.resolve(platform)?.authorization_url(state)
    }

    /// Exchange an authorization code and persist the resulting
    /// credential(s).
    pub async fn connect(&self, user_id: &str, platform: Platform, code: &str) -> ConnectResult {
        match self.try_connect(user_id, platform, code).await {
            Ok(result) => result,
            Err(e) => {
                warn!(%platform, user_id, error = %e, "connect failed");
                ConnectResult::failure(e.to_string())
            }
        }
    }

    async fn try_connect(
        &self,
        user_id: &str,
        platform: Platform,
        code: &str,
    ) -> Result<ConnectResult> {
        let adapter = self.resolver.resolve(platform)?;
        if !adapter.supports_exchange() {
            return Err(Error::UnsupportedOperation {
                platform,
                operation: "code exchange",
            });
        }

        let exchanged = adapter.exchange_code(code).await?;
        let expires_at = exchanged.expires_at();
        let raw = exchanged.raw.clone();

        let sub_accounts = raw
            .as_ref()
            .map(|payload| adapter.sub_accounts(payload))
            .unwrap_or_default();

        let credential = if sub_accounts.is_empty() {
            // Single-credential platform: one credential per login.
            let mut credential = Credential::new(
                user_id,
                platform,
                exchanged.access_token.clone(),
                exchanged.provider_account_id.clone().unwrap_or_default(),
                expires_at,
            );
            credential.refresh_token = exchanged.refresh_token.clone();
            credential.scope = exchanged.scope.clone();
            self.upsert(credential).await?
        } else {
            // Sub-account fan-out: one credential per eligible page/channel.
            let discovered = sub_accounts.len();
            let mut persisted = None;
            for sub in sub_accounts {
                if !sub.eligible {
                    debug!(%platform, open_id = %sub.open_id, "skipping sub-account without required link");
                    continue;
                }
                let sub_expires_at = sub
                    .expires_in
                    .map(|secs| chrono::Utc::now() + chrono::Duration::seconds(secs))
                    .unwrap_or(expires_at);
                let mut credential = Credential::new(
                    user_id,
                    platform,
                    sub.access_token,
                    sub.open_id,
                    sub_expires_at,
                );
                credential.display_name = sub.display_name;
                credential.refresh_token = exchanged.refresh_token.clone();
                credential.scope = exchanged.scope.clone();
                let saved = self.upsert(credential).await?;
                persisted.get_or_insert(saved);
            }
            persisted.ok_or_else(|| {
                Error::Exchange(format!(
                    "none of the {discovered} {platform} sub-accounts can publish; check the account links and try again"
                ))
            })?
        };

        info!(%platform, user_id, open_id = %credential.open_id, "account connected");
        self.schedule_expiry_recheck(user_id, platform).await;

        Ok(ConnectResult {
            success: true,
            message: format!("{platform} account connected"),
            credential: Some(credential),
            raw,
        })
    }

    /// Update-or-insert by (user, platform, open_id), validating first.
    async fn upsert(&self, credential: Credential) -> Result<Credential> {
        credential.validate()?;
        let existing = self
            .credentials
            .get_by_channel_and_platform(&credential.open_id, credential.platform)
            .await?
            .filter(|c| c.user_id == credential.user_id);
        if existing.is_some() {
            self.credentials.update(credential.clone()).await?;
        } else {
            self.credentials.create(credential.clone()).await?;
        }
        Ok(credential)
    }

    async fn schedule_expiry_recheck(&self, user_id: &str, platform: Platform) {
        let payload = json!({ "user_id": user_id, "platform": platform });
        if let Err(e) = self
            .scheduler
            .schedule("credentials", "expiry_recheck", payload, EXPIRY_RECHECK_DELAY)
            .await
        {
            // Best-effort: a missed re-check only delays the next refresh.
            warn!(%platform, user_id, error = %e, "failed to schedule expiry re-check");
        }
    }

    /// Refresh the stored credential for a user on a platform.
    pub async fn refresh(&self, user_id: &str, platform: Platform) -> RefreshResult {
        match self.try_refresh(user_id, platform).await {
            Ok(credential) => RefreshResult {
                success: true,
                message: format!("{platform} token refreshed"),
                credential: Some(credential),
            },
            Err(e) => {
                warn!(%platform, user_id, error = %e, "refresh failed");
                RefreshResult {
                    success: false,
                    message: e.to_string(),
                    credential: None,
                }
            }
        }
    }

    async fn try_refresh(&self, user_id: &str, platform: Platform) -> Result<Credential> {
        let credential = self
            .credentials
            .get_by_user_and_platform(user_id, platform)
            .await?
            .ok_or(Error::NotConnected(platform))?;

        let adapter = self.resolver.resolve(platform)?;
        if !adapter.supports_refresh() {
            return Err(Error::UnsupportedOperation {
                platform,
                operation: "token refresh",
            });
        }

        let refreshed = adapter.refresh_token(credential.refresh_source()).await?;
        let token = RefreshedToken {
            access_token: refreshed.access_token.clone(),
            // Token-rotating platforms send a replacement; the rest keep
            // the previous refresh token.
            refresh_token: refreshed
                .refresh_token
                .clone()
                .or_else(|| credential.refresh_token.clone()),
            expires_at: refreshed.expires_at(),
        };
        self.credentials.refresh(user_id, platform, token).await
    }

    /// Disconnect a platform: best-effort provider revoke, unconditional
    /// local deletion.
    pub async fn revoke(&self, user_id: &str, platform: Platform) -> RevokeResult {
        let credential = match self
            .credentials
            .get_by_user_and_platform(user_id, platform)
            .await
        {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                return RevokeResult {
                    success: false,
                    message: Error::NotConnected(platform).to_string(),
                    provider_revoked: false,
                };
            }
            Err(e) => {
                warn!(%platform, user_id, error = %e, "revoke lookup failed");
                return RevokeResult {
                    success: false,
                    message: e.to_string(),
                    provider_revoked: false,
                };
            }
        };

        let provider_revoked = match self.resolver.resolve(platform) {
            Ok(adapter) if adapter.supports_revoke() => {
                match adapter
                    .revoke_token(&credential.access_token, credential.refresh_token.as_deref())
                    .await
                {
                    Ok(revoked) => revoked,
                    Err(e) => {
                        // Best-effort: never abort the local deletion.
                        warn!(%platform, user_id, error = %e, "provider-side revoke failed, deleting local credential anyway");
                        false
                    }
                }
            }
            _ => false,
        };

        if let Err(e) = self
            .credentials
            .delete_by_user_and_platform(user_id, platform)
            .await
        {
            warn!(%platform, user_id, error = %e, "credential deletion failed");
            return RevokeResult {
                success: false,
                message: e.to_string(),
                provider_revoked,
            };
        }

        info!(%platform, user_id, provider_revoked, "account disconnected");
        RevokeResult {
            success: true,
            message: format!("{platform} account disconnected"),
            provider_revoked,
        }
    }
}
