use crate::platform::Platform;
use std::collections::HashMap;
use tracing::warn;
use url::Url;

/// OAuth app registration for one platform.
#[derive(Debug, Clone)]
pub struct OAuthAppConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Where the platform redirects after user consent.
    pub redirect_uri: Url,
    /// Scopes to request; empty means the adapter's defaults.
    pub scopes: Vec<String>,
}

impl OAuthAppConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: Url,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri,
            scopes: Vec::new(),
        }
    }

    pub fn with_scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Requested scopes as the space-separated string platforms expect,
    /// falling back to the adapter's defaults when none were configured.
    pub fn scope_param(&self, defaults: &[&str]) -> String {
        if self.scopes.is_empty() {
            defaults.join(" ")
        } else {
            self.scopes.join(" ")
        }
    }
}

/// Per-platform OAuth app configuration for the whole installation.
#[derive(Debug, Clone, Default)]
pub struct Config {
    apps: HashMap<Platform, OAuthAppConfig>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(mut self, platform: Platform, app: OAuthAppConfig) -> Self {
        self.apps.insert(platform, app);
        self
    }

    pub fn app(&self, platform: Platform) -> Option<&OAuthAppConfig> {
        self.apps.get(&platform)
    }

    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.apps.keys().copied()
    }

    /// Read configuration from `CROSSPOST_<PLATFORM>_CLIENT_ID`,
    /// `_CLIENT_SECRET`, `_REDIRECT_URI` and optional `_SCOPES`
    /// (space-separated). Platforms with incomplete configuration are
    /// skipped and stay unregistered.
    pub fn from_env() -> Self {
        let mut config = Config::new();
        for platform in Platform::ALL {
            let prefix = format!("CROSSPOST_{}", platform.as_str().to_uppercase());
            let (Ok(client_id), Ok(client_secret), Ok(redirect)) = (
                std::env::var(format!("{prefix}_CLIENT_ID")),
                std::env::var(format!("{prefix}_CLIENT_SECRET")),
                std::env::var(format!("{prefix}_REDIRECT_URI")),
            ) else {
                continue;
            };
            let redirect_uri = match redirect.parse::<Url>() {
                Ok(url) => url,
                Err(e) => {
                    warn!(%platform, error = %e, "invalid redirect URI, skipping platform");
                    continue;
                }
            };
            let mut app = OAuthAppConfig::new(client_id, client_secret, redirect_uri);
            if let Ok(scopes) = std::env::var(format!("{prefix}_SCOPES")) {
                app = app.with_scopes(scopes.split_whitespace().map(str::to_string));
            }
            config = config.with_platform(platform, app);
        }
        config
    }
}
