use crate::content::{PostContent, PublishTarget};
use crate::credential::Credential;
use crate::error::Result;
use crate::platform::Platform;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Payload for the refresh write-back: the fields a provider refresh is
/// allowed to change.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    /// `None` when the provider returned no new refresh token; the store
    /// keeps the previous one in that case.
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Storage abstraction for platform credentials.
///
/// Implementations must keep at most one credential per
/// (user_id, platform, open_id) triple; `create` on an existing triple
/// overwrites in place. Concurrent updates to the same key are last-write-wins.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get the credential for a user on a platform (the first, when the
    /// platform has several sub-accounts).
    async fn get_by_user_and_platform(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<Credential>>;

    /// Get a credential by its external sub-account id.
    async fn get_by_channel_and_platform(
        &self,
        open_id: &str,
        platform: Platform,
    ) -> Result<Option<Credential>>;

    /// All credentials a user holds, across platforms and sub-accounts.
    async fn get_all_by_user(&self, user_id: &str) -> Result<Vec<Credential>>;

    /// Insert a new credential.
    async fn create(&self, credential: Credential) -> Result<()>;

    /// Overwrite an existing credential in place.
    async fn update(&self, credential: Credential) -> Result<()>;

    /// Apply a refresh write-back to the (user_id, platform) credential and
    /// return the updated record.
    async fn refresh(
        &self,
        user_id: &str,
        platform: Platform,
        token: RefreshedToken,
    ) -> Result<Credential>;

    /// Delete every credential a user holds on a platform.
    async fn delete_by_user_and_platform(&self, user_id: &str, platform: Platform) -> Result<()>;
}

/// Storage abstraction for content items and their publish targets.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_by_id(&self, content_id: &str, user_id: &str) -> Result<Option<PostContent>>;

    /// Replace the full target list in one write, so readers never observe
    /// a half-updated list mid-publish.
    async fn update_targets(&self, content_id: &str, targets: Vec<PublishTarget>) -> Result<()>;
}

/// Post-publish indexing hook. Best-effort: callers log and continue on
/// failure.
#[async_trait]
pub trait SearchIndexer: Send + Sync {
    async fn index(&self, content: &PostContent) -> Result<()>;
}

/// Delayed-job capability, consumed to re-check expiring credentials on a
/// recurring cadence.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    async fn schedule(
        &self,
        queue: &str,
        job: &str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<()>;
}
