//! Tweet publishing.

use super::{PostingAdapter, publish_error};
use crate::content::{PostContent, PublishOutcome};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::platform::Platform;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;

const TWEETS_URL: &str = "https://api.twitter.com/2/tweets";

pub struct TwitterPoster {
    client: reqwest::Client,
    token: String,
}

impl TwitterPoster {
    pub fn new(credential: &Credential) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            client,
            token: credential.access_token.clone(),
        }
    }
}

#[async_trait]
impl PostingAdapter for TwitterPoster {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn publish(&self, content: &PostContent) -> Result<PublishOutcome> {
        let mut text = content.body.clone();
        if let Some(link) = &content.link {
            text.push(' ');
            text.push_str(link);
        }

        let response = self
            .client
            .post(TWEETS_URL)
            .bearer_auth(&self.token)
            .json(&json!({ "text": text }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(publish_error(Platform::Twitter, response).await);
        }

        let body: Value = response.json().await?;
        let tweet_id = body
            .pointer("/data/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::PublishTarget {
                platform: Platform::Twitter,
                message: "tweet creation returned no id".to_string(),
            })?;
        let permalink = Some(format!("https://twitter.com/i/web/status/{tweet_id}"));
        Ok(PublishOutcome {
            external_post_id: tweet_id,
            permalink,
        })
    }
}
