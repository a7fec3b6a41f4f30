//! LinkedIn OAuth 2.0 adapter.

use super::{OAuthAdapter, TokenExchangeResult, read_token_response};
use crate::config::OAuthAppConfig;
use crate::error::{Error, Result};
use crate::platform::Platform;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

const AUTHORIZE_URL: &str = "https://www.linkedin.com/oauth/v2/authorization";
const TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";
const USERINFO_URL: &str = "https://api.linkedin.com/v2/userinfo";
const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "w_member_social"];

pub struct LinkedinOAuth {
    app: OAuthAppConfig,
    client: reqwest::Client,
}

impl LinkedinOAuth {
    pub fn new(app: OAuthAppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self { app, client }
    }

    async fn fetch_userinfo(&self, token: &str) -> Result<Value> {
        let response = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Network(format!("userinfo failed: {status}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl OAuthAdapter for LinkedinOAuth {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    fn authorization_url(&self, state: &str) -> Result<Url> {
        let scope = self.app.scope_param(DEFAULT_SCOPES);
        let query = serde_urlencoded::to_string([
            ("response_type", "code"),
            ("client_id", self.app.client_id.as_str()),
            ("redirect_uri", self.app.redirect_uri.as_str()),
            ("state", state),
            ("scope", scope.as_str()),
        ])
        .map_err(|e| Error::Internal(e.to_string()))?;
        format!("{AUTHORIZE_URL}?{query}")
            .parse()
            .map_err(|e| Error::Internal(format!("authorization url: {e}")))
    }

    async fn verify_access_token(&self, token: &str) -> Result<bool> {
        let response = self
            .client
            .get(USERINFO_URL)
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

        let userinfo = self.fetch_userinfo(&token.access_token).await?;
        let provider_account_id = userinfo
            .get("sub")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(TokenExchangeResult {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in.unwrap_or(60 * 24 * 3600),
            scope: token.scope,
            provider_account_id,
            raw: Some(json!({ "userinfo": userinfo })),
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
            refresh_token: token.refresh_token,
            expires_in: token.expires_in.unwrap_or(60 * 24 * 3600),
            scope: token.scope,
            provider_account_id: None,
            raw: None,
        })
    }

    // LinkedIn exposes no token revocation endpoint; local deletion is the
    // whole disconnect. `supports_revoke` stays false.

    async fn get_profile(
        &self,
        token: &str,
        _provider_account_id: Option<&str>,
    ) -> Result<Value> {
        self.fetch_userinfo(token).await
    }
}
