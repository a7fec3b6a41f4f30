//! Instagram publishing via the content publishing API.
//!
//! Instagram publishes in two phases: create a media container, wait for
//! the platform to finish ingesting it, then publish the container. The
//! wait is a bounded poll — fixed attempts at a fixed interval — and gives
//! up with a timeout error instead of looping forever.

use super::{PostingAdapter, publish_error};
use crate::content::{PostContent, PublishOutcome};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::platform::Platform;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";
const POLL_ATTEMPTS: u32 = 20;
const POLL_INTERVAL: Duration = Duration::from_secs(3);

pub struct InstagramPoster {
    client: reqwest::Client,
    ig_account_id: String,
    token: String,
}

impl InstagramPoster {
    pub fn new(credential: &Credential) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            client,
            ig_account_id: credential.open_id.clone(),
            token: credential.access_token.clone(),
        }
    }

    async fn create_container(&self, content: &PostContent, image_url: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{GRAPH_BASE}/{}/media", self.ig_account_id))
            .form(&[
                ("image_url", image_url),
                ("caption", content.body.as_str()),
                ("access_token", self.token.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(publish_error(Platform::Instagram, response).await);
        }
        let body: Value = response.json().await?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::PublishTarget {
                platform: Platform::Instagram,
                message: "container creation returned no id".to_string(),
            })
    }

    /// Wait for the container to finish server-side processing.
    async fn await_container(&self, container_id: &str) -> Result<()> {
        for attempt in 1..=POLL_ATTEMPTS {
            let response = self
                .client
                .get(format!("{GRAPH_BASE}/{container_id}"))
                .query(&[
                    ("fields", "status_code"),
                    ("access_token", self.token.as_str()),
                ])
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(publish_error(Platform::Instagram, response).await);
            }
            let body: Value = response.json().await?;
            match body.get("status_code").and_then(Value::as_str) {
                Some("FINISHED") => return Ok(()),
                Some("ERROR") | Some("EXPIRED") => {
                    return Err(Error::PublishTarget {
                        platform: Platform::Instagram,
                        message: format!(
                            "container processing failed: {}",
                            body.get("status_code").and_then(Value::as_str).unwrap_or("?")
                        ),
                    });
                }
                status => {
                    debug!(?status, attempt, "instagram container still processing");
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Err(Error::PublishTarget {
            platform: Platform::Instagram,
            message: format!("container not ready after {POLL_ATTEMPTS} checks"),
        })
    }

    async fn publish_container(&self, container_id: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{GRAPH_BASE}/{}/media_publish", self.ig_account_id))
            .form(&[
                ("creation_id", container_id),
                ("access_token", self.token.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(publish_error(Platform::Instagram, response).await);
        }
        let body: Value = response.json().await?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::PublishTarget {
                platform: Platform::Instagram,
                message: "publish returned no media id".to_string(),
            })
    }

    async fn fetch_permalink(&self, media_id: &str) -> Option<String> {
        let response = self
            .client
            .get(format!("{GRAPH_BASE}/{media_id}"))
            .query(&[
                ("fields", "permalink"),
                ("access_token", self.token.as_str()),
            ])
            .send()
            .await
            .ok()?;
        let body: Value = response.json().await.ok()?;
        body.get("permalink")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[async_trait]
impl PostingAdapter for InstagramPoster {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn publish(&self, content: &PostContent) -> Result<PublishOutcome> {
        let Some(image_url) = content.media_urls.first() else {
            return Err(Error::PublishTarget {
                platform: Platform::Instagram,
                message: "instagram requires at least one media url".to_string(),
            });
        };

        let container_id = self.create_container(content, image_url).await?;
        self.await_container(&container_id).await?;
        let media_id = self.publish_container(&container_id).await?;
        let permalink = self.fetch_permalink(&media_id).await;
        Ok(PublishOutcome {
            external_post_id: media_id,
            permalink,
        })
    }
}
