//! YouTube video publishing via the resumable upload protocol.
//!
//! The first media url is fetched server-side and streamed up in a single
//! resumable session: initiate to get the upload location, then PUT the
//! bytes. Uploads get a generous timeout since video payloads are large.

use super::{PostingAdapter, publish_error};
use crate::content::{PostContent, PublishOutcome};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::platform::Platform;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

pub struct YoutubePoster {
    client: reqwest::Client,
    token: String,
}

impl YoutubePoster {
    pub fn new(credential: &Credential) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .expect("reqwest client");
        Self {
            client,
            token: credential.access_token.clone(),
        }
    }

    /// Initiate a resumable upload session; returns the session URI.
    async fn initiate_upload(&self, content: &PostContent) -> Result<String> {
        let title = content.title.clone().unwrap_or_else(|| {
            content.body.chars().take(80).collect::<String>()
        });
        let response = self
            .client
            .post(UPLOAD_URL)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(&self.token)
            .json(&json!({
                "snippet": { "title": title, "description": content.body },
                "status": { "privacyStatus": "public" },
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(publish_error(Platform::Youtube, response).await);
        }
        response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::PublishTarget {
                platform: Platform::Youtube,
                message: "upload initiation returned no session uri".to_string(),
            })
    }

    async fn fetch_media(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::PublishTarget {
                platform: Platform::Youtube,
                message: format!("media fetch failed: {}", response.status()),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl PostingAdapter for YoutubePoster {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn publish(&self, content: &PostContent) -> Result<PublishOutcome> {
        let Some(media_url) = content.media_urls.first() else {
            return Err(Error::PublishTarget {
                platform: Platform::Youtube,
                message: "youtube requires a video media url".to_string(),
            });
        };

        let session_uri = self.initiate_upload(content).await?;
        let media = self.fetch_media(media_url).await?;
        debug!(bytes = media.len(), "uploading video");

        let response = self
            .client
            .put(&session_uri)
            .bearer_auth(&self.token)
            .body(media)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(publish_error(Platform::Youtube, response).await);
        }

        let body: Value = response.json().await?;
        let video_id = body
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::PublishTarget {
                platform: Platform::Youtube,
                message: "upload returned no video id".to_string(),
            })?;
        let permalink = Some(format!("https://www.youtube.com/watch?v={video_id}"));
        Ok(PublishOutcome {
            external_post_id: video_id,
            permalink,
        })
    }
}
