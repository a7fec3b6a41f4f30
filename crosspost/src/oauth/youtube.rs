//! YouTube (Google) OAuth 2.0 adapter.
//!
//! Google issues the refresh token once, on the initial consent, and omits
//! it from refresh responses — callers keep the original. The connected
//! channel id is the credential's open id.

use super::{OAuthAdapter, TokenExchangeResult, read_token_response};
use crate::config::OAuthAppConfig;
use crate::error::{Error, Result};
use crate::platform::Platform;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
const TOKENINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/tokeninfo";
const CHANNELS_URL: &str = "https://www.googleapis.com/youtube/v3/channels";
const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/youtube.upload",
    "https://www.googleapis.com/auth/youtube.readonly",
];

pub struct YoutubeOAuth {
    app: OAuthAppConfig,
    client: reqwest::Client,
}

impl YoutubeOAuth {
    pub fn new(app: OAuthAppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self { app, client }
    }

    /// The authenticated user's own channel.
    async fn fetch_channel(&self, token: &str) -> Result<Value> {
        let response = self
            .client
            .get(CHANNELS_URL)
            .query(&[("part", "id,snippet"), ("mine", "true")])
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Network(format!("channel lookup failed: {status}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl OAuthAdapter for YoutubeOAuth {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    fn authorization_url(&self, state: &str) -> Result<Url> {
        let scope = self.app.scope_param(DEFAULT_SCOPES);
        let query = serde_urlencoded::to_string([
            ("response_type", "code"),
            ("client_id", self.app.client_id.as_str()),
            ("redirect_uri", self.app.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("state", state),
            // Required for Google to issue a refresh token at all.
            ("access_type", "offline"),
            ("prompt", "consent"),
        ])
        .map_err(|e| Error::Internal(e.to_string()))?;
        format!("{AUTHORIZE_URL}?{query}")
            .parse()
            .map_err(|e| Error::Internal(format!("authorization url: {e}")))
    }

    async fn verify_access_token(&self, token: &str) -> Result<bool> {
        let response = self
            .client
            .get(TOKENINFO_URL)
            .query(&[("access_token", token)])
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    fn supports_exchange(&self) -> bool {
        true
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResult> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.app.redirect_uri.as_str()),
                ("client_id", self.app.client_id.as_str()),
                ("client_secret", self.app.client_secret.as_str()),
            ])
            .send()
            .await?;
        let token = read_token_response(response, Error::Exchange).await?;

        let channel = self.fetch_channel(&token.access_token).await?;
        let provider_account_id = channel
            .pointer("/items/0/id")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(TokenExchangeResult {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in.unwrap_or(3600),
            scope: token.scope,
            provider_account_id,
            raw: Some(json!({ "channel": channel })),
        })
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    async fn refresh_token(&self, current: &str) -> Result<TokenExchangeResult> {
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current),
                ("client_id", self.app.client_id.as_str()),
                ("client_secret", self.app.client_secret.as_str()),
            ])
            .send()
            .await?;
        let token = read_token_response(response, Error::Refresh).await?;
        Ok(TokenExchangeResult {
            access_token: token.access_token,
            // Google omits the refresh token here; the caller keeps the old one.
            refresh_token: token.refresh_token,
            expires_in: token.expires_in.unwrap_or(3600),
            scope: token.scope,
            provider_account_id: None,
            raw: None,
        })
    }

    fn supports_revoke(&self) -> bool {
        true
    }

    async fn revoke_token(&self, access_token: &str, refresh_token: Option<&str>) -> Result<bool> {
        // Revoking either token invalidates the whole grant; prefer the
        // refresh token since it outlives the access token.
        let token = refresh_token.unwrap_or(access_token);
        let response = self
            .client
            .post(REVOKE_URL)
            .form(&[("token", token)])
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    async fn get_profile(
        &self,
        token: &str,
        _provider_account_id: Option<&str>,
    ) -> Result<Value> {
        self.fetch_channel(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_url_requests_offline_access() {
        let adapter = YoutubeOAuth::new(OAuthAppConfig::new(
            "yt-id",
            "yt-secret",
            "https://example.com/callback".parse().unwrap(),
        ));
        let url = adapter.authorization_url("s").unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("access_type".into(), "offline".into())));
        assert!(pairs.contains(&("prompt".into(), "consent".into())));
    }
}
