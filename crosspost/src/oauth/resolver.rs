use super::{
    OAuthAdapter, facebook::FacebookOAuth, instagram::InstagramOAuth, linkedin::LinkedinOAuth,
    twitter::TwitterOAuth, youtube::YoutubeOAuth,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::platform::Platform;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps a platform identifier to its OAuth adapter.
///
/// The registry is populated once at construction from the installation
/// config; this is the only place platform implementations are registered.
pub struct OAuthResolver {
    adapters: HashMap<Platform, Arc<dyn OAuthAdapter>>,
}

impl OAuthResolver {
    /// Build the registry for every configured platform.
    pub fn new(config: &Config) -> Self {
        let mut adapters: HashMap<Platform, Arc<dyn OAuthAdapter>> = HashMap::new();
        for platform in config.platforms() {
            let app = config
                .app(platform)
                .expect("platforms() only yields configured entries")
                .clone();
            let adapter: Arc<dyn OAuthAdapter> = match platform {
                Platform::Facebook => Arc::new(FacebookOAuth::new(app)),
                Platform::Instagram => Arc::new(InstagramOAuth::new(app)),
                Platform::Twitter => Arc::new(TwitterOAuth::new(app)),
                Platform::Linkedin => Arc::new(LinkedinOAuth::new(app)),
                Platform::Youtube => Arc::new(YoutubeOAuth::new(app)),
            };
            adapters.insert(platform, adapter);
        }
        Self { adapters }
    }

    /// Build a resolver from pre-constructed adapters (tests, custom wiring).
    pub fn from_adapters(adapters: impl IntoIterator<Item = Arc<dyn OAuthAdapter>>) -> Self {
        Self {
            adapters: adapters
                .into_iter()
                .map(|adapter| (adapter.platform(), adapter))
                .collect(),
        }
    }

    pub fn resolve(&self, platform: Platform) -> Result<Arc<dyn OAuthAdapter>> {
        self.adapters
            .get(&platform)
            .cloned()
            .ok_or_else(|| Error::UnsupportedPlatform(platform.to_string()))
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.adapters.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthAppConfig;

    #[test]
    fn unregistered_platform_is_unsupported() {
        let resolver = OAuthResolver::new(&Config::new());
        let err = resolver.resolve(Platform::Twitter).unwrap_err();
        assert!(matches!(err, Error::UnsupportedPlatform(_)));
    }

    #[test]
    fn configured_platforms_resolve() {
        let app = OAuthAppConfig::new("id", "secret", "https://example.com/cb".parse().unwrap());
        let config = Config::new()
            .with_platform(Platform::Facebook, app.clone())
            .with_platform(Platform::Twitter, app);
        let resolver = OAuthResolver::new(&config);
        assert_eq!(
            resolver.resolve(Platform::Facebook).unwrap().platform(),
            Platform::Facebook
        );
        assert!(resolver.resolve(Platform::Youtube).is_err());
    }
}
