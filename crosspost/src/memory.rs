//! In-memory store implementations, for tests and single-process setups.

use crate::content::{PostContent, PublishTarget};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::store::{ContentStore, CredentialStore, JobScheduler, RefreshedToken, SearchIndexer};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

type CredentialKey = (String, Platform, String); // (user_id, platform, open_id)

#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    credentials: Arc<RwLock<HashMap<CredentialKey, Credential>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(credential: &Credential) -> CredentialKey {
        (
            credential.user_id.clone(),
            credential.platform,
            credential.open_id.clone(),
        )
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get_by_user_and_platform(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<Credential>> {
        let mut matches: Vec<Credential> = self
            .credentials
            .read()
            .unwrap()
            .values()
            .filter(|c| c.user_id == user_id && c.platform == platform)
            .cloned()
            .collect();
        // Deterministic "first" for multi-sub-account platforms.
        matches.sort_by(|a, b| a.open_id.cmp(&b.open_id));
        Ok(matches.into_iter().next())
    }

    async fn get_by_channel_and_platform(
        &self,
        open_id: &str,
        platform: Platform,
    ) -> Result<Option<Credential>> {
        Ok(self
            .credentials
            .read()
            .unwrap()
            .values()
            .find(|c| c.open_id == open_id && c.platform == platform)
            .cloned())
    }

    async fn get_all_by_user(&self, user_id: &str) -> Result<Vec<Credential>> {
        Ok(self
            .credentials
            .read()
            .unwrap()
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create(&self, credential: Credential) -> Result<()> {
        self.credentials
            .write()
            .unwrap()
            .insert(Self::key(&credential), credential);
        Ok(())
    }

    async fn update(&self, credential: Credential) -> Result<()> {
        self.credentials
            .write()
            .unwrap()
            .insert(Self::key(&credential), credential);
        Ok(())
    }

    async fn refresh(
        &self,
        user_id: &str,
        platform: Platform,
        token: RefreshedToken,
    ) -> Result<Credential> {
        let mut credentials = self.credentials.write().unwrap();
        let entry = credentials
            .values_mut()
            .find(|c| c.user_id == user_id && c.platform == platform)
            .ok_or(Error::NotConnected(platform))?;
        entry.access_token = token.access_token;
        if let Some(refresh_token) = token.refresh_token {
            entry.refresh_token = Some(refresh_token);
        }
        entry.expires_at = token.expires_at;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete_by_user_and_platform(&self, user_id: &str, platform: Platform) -> Result<()> {
        self.credentials
            .write()
            .unwrap()
            .retain(|_, c| !(c.user_id == user_id && c.platform == platform));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryContentStore {
    contents: Arc<RwLock<HashMap<String, PostContent>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, content: PostContent) {
        self.contents
            .write()
            .unwrap()
            .insert(content.id.clone(), content);
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get_by_id(&self, content_id: &str, user_id: &str) -> Result<Option<PostContent>> {
        Ok(self
            .contents
            .read()
            .unwrap()
            .get(content_id)
            .filter(|c| c.user_id == user_id)
            .cloned())
    }

    async fn update_targets(&self, content_id: &str, targets: Vec<PublishTarget>) -> Result<()> {
        let mut contents = self.contents.write().unwrap();
        let content = contents
            .get_mut(content_id)
            .ok_or_else(|| Error::Storage(format!("content {content_id} not found")))?;
        content.targets = targets;
        Ok(())
    }
}

/// A scheduler that records jobs instead of running them.
#[derive(Clone, Default)]
pub struct MemoryScheduler {
    jobs: Arc<RwLock<Vec<ScheduledJob>>>,
}

#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub queue: String,
    pub job: String,
    pub payload: serde_json::Value,
    pub delay: Duration,
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.jobs.read().unwrap().clone()
    }
}

#[async_trait]
impl JobScheduler for MemoryScheduler {
    async fn schedule(
        &self,
        queue: &str,
        job: &str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> Result<()> {
        self.jobs.write().unwrap().push(ScheduledJob {
            queue: queue.to_string(),
            job: job.to_string(),
            payload,
            delay,
        });
        Ok(())
    }
}

/// Indexer that drops everything. Placeholder until a search backend is wired.
#[derive(Clone, Copy, Default)]
pub struct NullIndexer;

#[async_trait]
impl SearchIndexer for NullIndexer {
    async fn index(&self, _content: &PostContent) -> Result<()> {
        Ok(())
    }
}
