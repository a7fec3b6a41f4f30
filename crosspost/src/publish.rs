//! Fan-out publishing of a post to its configured platform targets.

use crate::content::{PublishTarget, TargetStatus};
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::posting::PostingAdapterFactory;
use crate::store::{ContentStore, SearchIndexer};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-target result returned to the caller after a publish run.
#[derive(Debug, Clone, Serialize)]
pub struct TargetOutcome {
    pub platform: Platform,
    pub status: TargetStatus,
    pub external_post_id: Option<String>,
    pub permalink: Option<String>,
    pub error: Option<String>,
}

impl From<&PublishTarget> for TargetOutcome {
    fn from(target: &PublishTarget) -> Self {
        Self {
            platform: target.platform,
            status: target.status,
            external_post_id: target.external_post_id.clone(),
            permalink: target.permalink.clone(),
            error: target.error.clone(),
        }
    }
}

pub struct PublishUseCase {
    factory: Arc<PostingAdapterFactory>,
    content: Arc<dyn ContentStore>,
    indexer: Arc<dyn SearchIndexer>,
}

impl PublishUseCase {
    pub fn new(
        factory: Arc<PostingAdapterFactory>,
        content: Arc<dyn ContentStore>,
        indexer: Arc<dyn SearchIndexer>,
    ) -> Self {
        Self {
            factory,
            content,
            indexer,
        }
    }

    /// Publish a post to every pending target, in stored order.
    ///
    /// Already-published targets are skipped, so a retry after a partial
    /// failure only touches the targets that still need work. One failing
    /// target never aborts the rest; each failure is recorded on its
    /// target and the run continues.
    pub async fn publish(&self, content_id: &str, user_id: &str) -> Result<Vec<TargetOutcome>> {
        let post = self
            .content
            .get_by_id(content_id, user_id)
            .await?
            .ok_or_else(|| Error::Storage(format!("content {content_id} not found")))?;

        let mut targets = post.targets.clone();
        let mut published_now = false;
        for target in targets.iter_mut() {
            if target.is_published() {
                continue;
            }
            match self.publish_one(target.platform, user_id, &post).await {
                Ok(outcome) => {
                    info!(
                        platform = %target.platform,
                        content_id,
                        external_post_id = %outcome.external_post_id,
                        "target published"
                    );
                    target.mark_published(outcome);
                    published_now = true;
                }
                Err(e) => {
                    warn!(platform = %target.platform, content_id, error = %e, "target failed");
                    target.mark_failed(e.to_string());
                }
            }
        }

        // One batch write covers the whole run.
        self.content
            .update_targets(content_id, targets.clone())
            .await?;

        if published_now {
            let mut indexed = post.clone();
            indexed.targets = targets.clone();
            let indexer = self.indexer.clone();
            // Indexing is off the publish path; a failure only degrades
            // search freshness.
            tokio::spawn(async move {
                if let Err(e) = indexer.index(&indexed).await {
                    warn!(content_id = %indexed.id, error = %e, "search indexing failed");
                }
            });
        }

        Ok(targets.iter().map(TargetOutcome::from).collect())
    }

    async fn publish_one(
        &self,
        platform: Platform,
        user_id: &str,
        post: &crate::content::PostContent,
    ) -> Result<crate::content::PublishOutcome> {
        let adapter = self.factory.create(platform, user_id).await?;
        adapter.publish(post).await
    }
}
