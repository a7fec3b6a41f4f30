//! LinkedIn member post publishing.

use super::{PostingAdapter, publish_error};
use crate::content::{PostContent, PublishOutcome};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::platform::Platform;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const UGC_POSTS_URL: &str = "https://api.linkedin.com/v2/ugcPosts";

pub struct LinkedinPoster {
    client: reqwest::Client,
    member_id: String,
    token: String,
}

impl LinkedinPoster {
    pub fn new(credential: &Credential) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self {
            client,
            member_id: credential.open_id.clone(),
            token: credential.access_token.clone(),
        }
    }
}

#[async_trait]
impl PostingAdapter for LinkedinPoster {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    async fn publish(&self, content: &PostContent) -> Result<PublishOutcome> {
        let share_content = match &content.link {
            Some(link) => json!({
                "shareCommentary": { "text": content.body },
                "shareMediaCategory": "ARTICLE",
                "media": [{ "status": "READY", "originalUrl": link }],
            }),
            None => json!({
                "shareCommentary": { "text": content.body },
                "shareMediaCategory": "NONE",
            }),
        };

        let response = self
            .client
            .post(UGC_POSTS_URL)
            .bearer_auth(&self.token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&json!({
                "author": format!("urn:li:person:{}", self.member_id),
                "lifecycleState": "PUBLISHED",
                "specificContent": { "com.linkedin.ugc.ShareContent": share_content },
                "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" },
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(publish_error(Platform::Linkedin, response).await);
        }

        // LinkedIn returns the created URN in a header.
        let post_urn = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::PublishTarget {
                platform: Platform::Linkedin,
                message: "post creation returned no id".to_string(),
            })?;
        let permalink = Some(format!("https://www.linkedin.com/feed/update/{post_urn}"));
        Ok(PublishOutcome {
            external_post_id: post_urn,
            permalink,
        })
    }
}
