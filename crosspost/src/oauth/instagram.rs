//! Instagram OAuth adapter (via the Facebook Graph API).
//!
//! Publishing goes through the Instagram business account linked to a
//! Facebook page, so connection is the Facebook login flow with Instagram
//! scopes. Pages without a linked business account cannot publish and are
//! marked ineligible during sub-account discovery.

use super::facebook::{GRAPH_BASE, parse_pages};
use super::{OAuthAdapter, SubAccount, TokenExchangeResult, read_token_response};
use crate::config::OAuthAppConfig;
use crate::error::{Error, Result};
use crate::platform::Platform;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

const DIALOG_URL: &str = "https://www.facebook.com/v19.0/dialog/oauth";
const DEFAULT_SCOPES: &[&str] = &[
    "instagram_basic",
    "instagram_content_publish",
    "pages_show_list",
];

pub struct InstagramOAuth {
    app: OAuthAppConfig,
    client: reqwest::Client,
}

impl InstagramOAuth {
    pub fn new(app: OAuthAppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self { app, client }
    }

    async fn exchange_long_lived(&self, token: &str) -> Result<TokenExchangeResult> {
        let response = self
            .client
            .get(format!("{GRAPH_BASE}/oauth/access_token"))
            .query(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", self.app.client_id.as_str()),
                ("client_secret", self.app.client_secret.as_str()),
                ("fb_exchange_token", token),
            ])
            .send()
            .await?;
        let token = read_token_response(response, Error::Refresh).await?;
        Ok(TokenExchangeResult {
            access_token: token.access_token,
            refresh_token: None,
            expires_in: token.expires_in.unwrap_or(60 * 24 * 3600),
            scope: token.scope,
            provider_account_id: None,
            raw: None,
        })
    }

    async fn fetch_pages(&self, token: &str) -> Result<Value> {
        let response = self
            .client
            .get(format!("{GRAPH_BASE}/me/accounts"))
            .query(&[
                (
                    "fields",
                    "id,name,access_token,instagram_business_account{id}",
                ),
                ("access_token", token),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Exchange(format!("page listing failed: {status}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl OAuthAdapter for InstagramOAuth {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn authorization_url(&self, state: &str) -> Result<Url> {
        let scope = self.app.scope_param(DEFAULT_SCOPES);
        let query = serde_urlencoded::to_string([
            ("client_id", self.app.client_id.as_str()),
            ("redirect_uri", self.app.redirect_uri.as_str()),
            ("state", state),
            ("scope", scope.as_str()),
            ("response_type", "code"),
        ])
        .map_err(|e| Error::Internal(e.to_string()))?;
        format!("{DIALOG_URL}?{query}")
            .parse()
            .map_err(|e| Error::Internal(format!("authorization url: {e}")))
    }

    async fn verify_access_token(&self, token: &str) -> Result<bool> {
        let response = self
            .client
            .get(format!("{GRAPH_BASE}/me"))
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
            .get(format!("{GRAPH_BASE}/oauth/access_token"))
            .query(&[
                ("client_id", self.app.client_id.as_str()),
                ("client_secret", self.app.client_secret.as_str()),
                ("redirect_uri", self.app.redirect_uri.as_str()),
                ("code", code),
            ])
            .send()
            .await?;
        let short = read_token_response(response, Error::Exchange).await?;

        let mut long = self.exchange_long_lived(&short.access_token).await?;
        let pages = self.fetch_pages(&long.access_token).await?;
        long.scope = long.scope.or(short.scope);
        long.raw = Some(json!({ "pages": pages }));
        Ok(long)
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    async fn refresh_token(&self, current: &str) -> Result<TokenExchangeResult> {
        self.exchange_long_lived(current).await
    }

    fn supports_revoke(&self) -> bool {
        true
    }

    async fn revoke_token(&self, access_token: &str, _refresh_token: Option<&str>) -> Result<bool> {
        let response = self
            .client
            .delete(format!("{GRAPH_BASE}/me/permissions"))
            .query(&[("access_token", access_token)])
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    /// Pages without a linked Instagram business account are ineligible;
    /// eligible pages are addressed by the business account id, which is
    /// what publishing targets.
    fn sub_accounts(&self, raw: &Value) -> Vec<SubAccount> {
        let mut subs = parse_pages(raw, |page| {
            page.pointer("/instagram_business_account/id").is_some()
        });
        let Some(pages) = raw.pointer("/pages/data").and_then(Value::as_array) else {
            return subs;
        };
        for sub in subs.iter_mut().filter(|s| s.eligible) {
            let ig_id = pages
                .iter()
                .find(|page| page.get("id").and_then(Value::as_str) == Some(sub.open_id.as_str()))
                .and_then(|page| page.pointer("/instagram_business_account/id"))
                .and_then(Value::as_str);
            if let Some(ig_id) = ig_id {
                sub.open_id = ig_id.to_string();
            }
        }
        subs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> InstagramOAuth {
        InstagramOAuth::new(OAuthAppConfig::new(
            "ig-id",
            "ig-secret",
            "https://example.com/callback".parse().unwrap(),
        ))
    }

    #[test]
    fn pages_without_business_account_are_ineligible() {
        let raw = json!({
            "pages": { "data": [
                {
                    "id": "p1",
                    "name": "Linked",
                    "access_token": "pt1",
                    "instagram_business_account": { "id": "ig1" }
                },
                { "id": "p2", "name": "Unlinked", "access_token": "pt2" },
                { "id": "p3", "name": "Also unlinked", "access_token": "pt3" }
            ]}
        });
        let subs = adapter().sub_accounts(&raw);
        assert_eq!(subs.len(), 3);
        assert_eq!(subs.iter().filter(|s| s.eligible).count(), 1);
        // Eligible sub-account is addressed by the business account id.
        assert_eq!(subs[0].open_id, "ig1");
        assert_eq!(subs[1].open_id, "p2");
    }
}
