//! Turns a (platform, user) pair into a ready, authenticated posting
//! client, hiding token expiry and refresh from callers.

use super::{PlatformClients, PostingAdapter, PostingClientBuilder};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::oauth::OAuthResolver;
use crate::platform::Platform;
use crate::store::{CredentialStore, RefreshedToken};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

type CacheKey = (Platform, String);

struct CachedClient {
    client: Arc<dyn PostingAdapter>,
    /// Mirrors the credential's expiry at build time; a cached client is
    /// never handed out past it.
    expires_at: DateTime<Utc>,
}

pub struct PostingAdapterFactory {
    resolver: Arc<OAuthResolver>,
    credentials: Arc<dyn CredentialStore>,
    builder: Arc<dyn PostingClientBuilder>,
    cache: RwLock<HashMap<CacheKey, CachedClient>>,
    /// Per-key guards serializing the whole load→refresh→build path, so
    /// concurrent creates for one key perform at most one provider refresh.
    flights: tokio::sync::Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl PostingAdapterFactory {
    pub fn new(resolver: Arc<OAuthResolver>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self::with_builder(resolver, credentials, Arc::new(PlatformClients))
    }

    pub fn with_builder(
        resolver: Arc<OAuthResolver>,
        credentials: Arc<dyn CredentialStore>,
        builder: Arc<dyn PostingClientBuilder>,
    ) -> Self {
        Self {
            resolver,
            credentials,
            builder,
            cache: RwLock::new(HashMap::new()),
            flights: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Load the credential, refresh it if expired, and return a cached or
    /// freshly built posting client for it.
    pub async fn create(
        &self,
        platform: Platform,
        user_id: &str,
    ) -> Result<Arc<dyn PostingAdapter>> {
        let key: CacheKey = (platform, user_id.to_string());
        let flight = {
            let mut flights = self.flights.lock().await;
            flights
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let result = {
            let _guard = flight.lock().await;
            self.load_client(&key, platform, user_id).await
        };

        // Prune the guard once no other task holds it (map + ours = 2);
        // clones are only taken under the flights lock, so the count is
        // stable here.
        let mut flights = self.flights.lock().await;
        if Arc::strong_count(&flight) == 2 {
            flights.remove(&key);
        }
        drop(flights);

        result
    }

    async fn load_client(
        &self,
        key: &CacheKey,
        platform: Platform,
        user_id: &str,
    ) -> Result<Arc<dyn PostingAdapter>> {
        let mut credential = self
            .credentials
            .get_by_user_and_platform(user_id, platform)
            .await?
            .ok_or(Error::NotConnected(platform))?;

        if credential.is_expired() {
            credential = self.refresh_credential(&credential).await?;
            // The old client holds the rotated-out token.
            self.invalidate(platform, user_id);
        }

        if let Some(entry) = self.cache.read().unwrap().get(key) {
            if entry.expires_at > Utc::now() {
                return Ok(entry.client.clone());
            }
        }

        debug!(%platform, user_id, "building posting client");
        let client = self.builder.build(&credential)?;
        self.cache.write().unwrap().insert(
            key.clone(),
            CachedClient {
                client: client.clone(),
                expires_at: credential.expires_at,
            },
        );
        Ok(client)
    }

    /// Drop the cached client for a key, forcing a rebuild on next use.
    pub fn invalidate(&self, platform: Platform, user_id: &str) {
        self.cache
            .write()
            .unwrap()
            .remove(&(platform, user_id.to_string()));
    }

    /// Refresh an expired credential through the OAuth layer and persist
    /// the rotation. A failed refresh is the one unrecoverable case: the
    /// user has to reconnect the platform.
    async fn refresh_credential(&self, credential: &Credential) -> Result<Credential> {
        let platform = credential.platform;
        let adapter = self.resolver.resolve(platform)?;
        if !adapter.supports_refresh() {
            return Err(Error::ReauthenticationRequired { platform });
        }

        let refreshed = adapter
            .refresh_token(credential.refresh_source())
            .await
            .map_err(|e| {
                warn!(%platform, user_id = %credential.user_id, error = %e, "token refresh failed");
                Error::ReauthenticationRequired { platform }
            })?;

        let token = RefreshedToken {
            access_token: refreshed.access_token.clone(),
            refresh_token: refreshed
                .refresh_token
                .clone()
                .or_else(|| credential.refresh_token.clone()),
            expires_at: refreshed.expires_at(),
        };
        self.credentials
            .refresh(&credential.user_id, platform, token)
            .await
    }
}
