use crate::platform::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of one publish target through its lifecycle.
///
/// `Published` is terminal: the orchestrator never re-attempts a target in
/// that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
}

/// One platform destination of a content item, with its own outcome.
///
/// Created alongside the content item at `Draft` or `Scheduled`; mutated
/// exclusively by the publish use case, one mutation per attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishTarget {
    pub platform: Platform,
    pub status: TargetStatus,
    pub external_post_id: Option<String>,
    pub permalink: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl PublishTarget {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            status: TargetStatus::Draft,
            external_post_id: None,
            permalink: None,
            published_at: None,
            error: None,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == TargetStatus::Published
    }

    pub fn mark_published(&mut self, outcome: PublishOutcome) {
        self.status = TargetStatus::Published;
        self.external_post_id = Some(outcome.external_post_id);
        self.permalink = outcome.permalink;
        self.published_at = Some(Utc::now());
        self.error = None;
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = TargetStatus::Failed;
        self.error = Some(message.into());
    }
}

/// What a posting adapter reports back after a successful publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub external_post_id: String,
    pub permalink: Option<String>,
}

/// A content item destined for one or more platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostContent {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub body: String,
    pub link: Option<String>,
    pub media_urls: Vec<String>,
    pub targets: Vec<PublishTarget>,
}

impl PostContent {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            title: None,
            body: body.into(),
            link: None,
            media_urls: Vec::new(),
            targets: Vec::new(),
        }
    }

    pub fn with_target(mut self, platform: Platform) -> Self {
        self.targets.push(PublishTarget::new(platform));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_published_clears_previous_error() {
        let mut target = PublishTarget::new(Platform::Twitter);
        target.mark_failed("rate limited");
        assert_eq!(target.status, TargetStatus::Failed);

        target.mark_published(PublishOutcome {
            external_post_id: "123".into(),
            permalink: Some("https://twitter.com/i/web/status/123".into()),
        });
        assert!(target.is_published());
        assert!(target.error.is_none());
        assert!(target.published_at.is_some());
    }

    #[test]
    fn targets_round_trip_through_json() {
        let content = PostContent::new("c1", "u1", "hello")
            .with_target(Platform::Facebook)
            .with_target(Platform::Linkedin);
        let json = serde_json::to_string(&content.targets).unwrap();
        let back: Vec<PublishTarget> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].platform, Platform::Facebook);
    }
}
