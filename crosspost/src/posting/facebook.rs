//! Facebook page publishing.

use super::{PostingAdapter, publish_error};
use crate::content::{PostContent, PublishOutcome};
use crate::credential::Credential;
use crate::error::Result;
use crate::platform::Platform;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";

pub struct FacebookPoster {
    client: reqwest::Client,
    page_id: String,
    page_token: String,
}

impl FacebookPoster {
    pub fn new(credential: &Credential) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client");
        Self {
            client,
            page_id: credential.open_id.clone(),
            page_token: credential.access_token.clone(),
        }
    }
}

#[async_trait]
impl PostingAdapter for FacebookPoster {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn publish(&self, content: &PostContent) -> Result<PublishOutcome> {
        let mut form: Vec<(&str, &str)> = vec![
            ("message", content.body.as_str()),
            ("access_token", self.page_token.as_str()),
        ];
        if let Some(link) = &content.link {
            form.push(("link", link));
        }

        let response = self
            .client
            .post(format!("{GRAPH_BASE}/{}/feed", self.page_id))
            .form(&form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(publish_error(Platform::Facebook, response).await);
        }

        let body: Value = response.json().await?;
        let post_id = body
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let permalink = Some(format!("https://www.facebook.com/{post_id}"));
        Ok(PublishOutcome {
            external_post_id: post_id,
            permalink,
        })
    }
}
