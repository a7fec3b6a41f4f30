//! Platform posting clients: live, authenticated clients capable of
//! publishing one content item to one platform.

pub mod facebook;
mod factory;
pub mod instagram;
pub mod linkedin;
pub mod twitter;
pub mod youtube;

pub use factory::PostingAdapterFactory;

use crate::content::{PostContent, PublishOutcome};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::platform::Platform;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait PostingAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    async fn publish(&self, content: &PostContent) -> Result<PublishOutcome>;
}

impl std::fmt::Debug for dyn PostingAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostingAdapter")
            .field("platform", &self.platform())
            .finish()
    }
}

/// Constructs a posting client from a (non-expired) credential.
///
/// Injected into the factory so tests can substitute counting doubles; the
/// default wires up the real platform clients.
pub trait PostingClientBuilder: Send + Sync {
    fn build(&self, credential: &Credential) -> Result<Arc<dyn PostingAdapter>>;
}

/// Default builder over the closed platform set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformClients;

impl PostingClientBuilder for PlatformClients {
    fn build(&self, credential: &Credential) -> Result<Arc<dyn PostingAdapter>> {
        Ok(match credential.platform {
            Platform::Facebook => Arc::new(facebook::FacebookPoster::new(credential)),
            Platform::Instagram => Arc::new(instagram::InstagramPoster::new(credential)),
            Platform::Twitter => Arc::new(twitter::TwitterPoster::new(credential)),
            Platform::Linkedin => Arc::new(linkedin::LinkedinPoster::new(credential)),
            Platform::Youtube => Arc::new(youtube::YoutubePoster::new(credential)),
        })
    }
}

/// Map a non-success platform response to a per-target publish error.
pub(crate) async fn publish_error(platform: Platform, response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::PublishTarget {
        platform,
        message: format!("{status}: {body}"),
    }
}
