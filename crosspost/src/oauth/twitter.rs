//! Twitter/X OAuth 2.0 adapter (confidential client).
//!
//! Twitter rotates the refresh token on every refresh: the old one is
//! invalidated and the response carries its replacement, which must be
//! persisted immediately.

use super::{OAuthAdapter, TokenExchangeResult, read_token_response};
use crate::config::OAuthAppConfig;
use crate::error::{Error, Result};
use crate::platform::Platform;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

const AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
const TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
const REVOKE_URL: &str = "https://api.twitter.com/2/oauth2/revoke";
const ME_URL: &str = "https://api.twitter.com/2/users/me";
const DEFAULT_SCOPES: &[&str] = &["tweet.read", "tweet.write", "users.read", "offline.access"];

pub struct TwitterOAuth {
    app: OAuthAppConfig,
    client: reqwest::Client,
}

impl TwitterOAuth {
    pub fn new(app: OAuthAppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self { app, client }
    }

    async fn fetch_me(&self, token: &str) -> Result<Value> {
        let response = self
            .client
            .get(ME_URL)
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Network(format!("user lookup failed: {status}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl OAuthAdapter for TwitterOAuth {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn authorization_url(&self, state: &str) -> Result<Url> {
        let scope = self.app.scope_param(DEFAULT_SCOPES);
        let query = serde_urlencoded::to_string([
            ("response_type", "code"),
            ("client_id", self.app.client_id.as_str()),
            ("redirect_uri", self.app.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("state", state),
        ])
        .map_err(|e| Error::Internal(e.to_string()))?;
        format!("{AUTHORIZE_URL}?{query}")
            .parse()
            .map_err(|e| Error::Internal(format!("authorization url: {e}")))
    }

    async fn verify_access_token(&self, token: &str) -> Result<bool> {
        let response = self
            .client
            .get(ME_URL)
            .bearer_auth(token)
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
            .basic_auth(&self.app.client_id, Some(&self.app.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.app.redirect_uri.as_str()),
            ])
            .send()
            .await?;
        let token = read_token_response(response, Error::Exchange).await?;

        let me = self.fetch_me(&token.access_token).await?;
        let provider_account_id = me
            .pointer("/data/id")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(TokenExchangeResult {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in.unwrap_or(7200),
            scope: token.scope,
            provider_account_id,
            raw: Some(json!({ "user": me })),
        })
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    async fn refresh_token(&self, current: &str) -> Result<TokenExchangeResult> {
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.app.client_id, Some(&self.app.client_secret))
            .form(&[("grant_type", "refresh_token"), ("refresh_token", current)])
            .send()
            .await?;
        let token = read_token_response(response, Error::Refresh).await?;
        Ok(TokenExchangeResult {
            access_token: token.access_token,
            // Rotated on every refresh.
            refresh_token: token.refresh_token,
            expires_in: token.expires_in.unwrap_or(7200),
            scope: token.scope,
            provider_account_id: None,
            raw: None,
        })
    }

    fn supports_revoke(&self) -> bool {
        true
    }

    async fn revoke_token(&self, access_token: &str, _refresh_token: Option<&str>) -> Result<bool> {
        let response = self
            .client
            .post(REVOKE_URL)
            .basic_auth(&self.app.client_id, Some(&self.app.client_secret))
            .form(&[
                ("token", access_token),
                ("token_type_hint", "access_token"),
            ])
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    async fn get_profile(
        &self,
        token: &str,
        _provider_account_id: Option<&str>,
    ) -> Result<Value> {
        self.fetch_me(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_url_requests_offline_access_by_default() {
        let adapter = TwitterOAuth::new(OAuthAppConfig::new(
            "tw-id",
            "tw-secret",
            "https://example.com/callback".parse().unwrap(),
        ));
        let url = adapter.authorization_url("st4te").unwrap();
        let scope = url
            .query_pairs()
            .find(|(k, _)| k == "scope")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert!(scope.contains("offline.access"));
        assert!(url.as_str().contains("state=st4te"));
    }
}
