//! Facebook (Graph API) OAuth adapter.
//!
//! Facebook has no refresh endpoint; the long-lived user token re-exchanges
//! itself via `fb_exchange_token`, so the access token doubles as its own
//! refresh source. Each managed page carries its own ~60-day page token,
//! surfaced as sub-accounts for per-page credentials.

use super::{OAuthAdapter, SubAccount, TokenExchangeResult, read_token_response};
use crate::config::OAuthAppConfig;
use crate::error::{Error, Result};
use crate::platform::Platform;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

pub(crate) const GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";
const DIALOG_URL: &str = "https://www.facebook.com/v19.0/dialog/oauth";
const DEFAULT_SCOPES: &[&str] = &[
    "pages_show_list",
    "pages_manage_posts",
    "pages_read_engagement",
];
// Page tokens issued off a long-lived user token last about 60 days.
const PAGE_TOKEN_TTL_SECS: i64 = 60 * 24 * 3600;

pub struct FacebookOAuth {
    app: OAuthAppConfig,
    client: reqwest::Client,
}

impl FacebookOAuth {
    pub fn new(app: OAuthAppConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("reqwest client");
        Self { app, client }
    }

    /// Exchange a short-lived user token for a long-lived one.
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
            expires_in: token.expires_in.unwrap_or(PAGE_TOKEN_TTL_SECS),
            scope: token.scope,
            provider_account_id: None,
            raw: None,
        })
    }

    /// Fetch the pages the logged-in user manages, with their page tokens.
    async fn fetch_pages(&self, token: &str) -> Result<Value> {
        let response = self
            .client
            .get(format!("{GRAPH_BASE}/me/accounts"))
            .query(&[
                ("fields", "id,name,access_token"),
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
impl OAuthAdapter for FacebookOAuth {
    fn platform(&self) -> Platform {
        Platform::Facebook
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

        // Upgrade to the long-lived token before anything is persisted.
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

    async fn get_profile(
        &self,
        token: &str,
        _provider_account_id: Option<&str>,
    ) -> Result<Value> {
        let response = self
            .client
            .get(format!("{GRAPH_BASE}/me"))
            .query(&[("fields", "id,name"), ("access_token", token)])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Network(format!("profile fetch failed: {status}")));
        }
        Ok(response.json().await?)
    }

    fn sub_accounts(&self, raw: &Value) -> Vec<SubAccount> {
        parse_pages(raw, |_page| true)
    }
}

/// Shared page-list parsing for the Graph-backed adapters. `eligible`
/// decides whether a page carries the linked capability publishing needs.
pub(crate) fn parse_pages(raw: &Value, eligible: fn(&Value) -> bool) -> Vec<SubAccount> {
    let Some(pages) = raw
        .pointer("/pages/data")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    pages
        .iter()
        .filter_map(|page| {
            let open_id = page.get("id")?.as_str()?.to_string();
            let access_token = page.get("access_token")?.as_str()?.to_string();
            Some(SubAccount {
                open_id,
                display_name: page
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                access_token,
                expires_in: Some(PAGE_TOKEN_TTL_SECS),
                eligible: eligible(page),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> FacebookOAuth {
        FacebookOAuth::new(OAuthAppConfig::new(
            "fb-id",
            "fb-secret",
            "https://example.com/callback".parse().unwrap(),
        ))
    }

    #[test]
    fn authorization_url_carries_state_and_client() {
        let url = adapter().authorization_url("opaque-state").unwrap();
        assert!(url.as_str().starts_with(DIALOG_URL));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("state".into(), "opaque-state".into())));
        assert!(pairs.contains(&("client_id".into(), "fb-id".into())));
    }

    #[test]
    fn sub_accounts_parse_page_tokens() {
        let raw = json!({
            "pages": { "data": [
                { "id": "p1", "name": "Page One", "access_token": "pt1" },
                { "id": "p2", "access_token": "pt2" },
                { "id": "broken" }
            ]}
        });
        let subs = adapter().sub_accounts(&raw);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].open_id, "p1");
        assert_eq!(subs[0].display_name.as_deref(), Some("Page One"));
        assert!(subs.iter().all(|s| s.eligible));
    }
}
