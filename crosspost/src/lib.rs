//! # crosspost
//!
//! Social account connection and multi-platform publishing.
//!
//! This crate connects user accounts on Facebook, Instagram, Twitter,
//! LinkedIn, and YouTube through their OAuth flows, keeps the stored
//! tokens fresh, and fans a post out to every connected platform with
//! per-target success tracking.
//!
//! ## Features
//!
//! - **Credential lifecycle**: code exchange, token refresh, and revoke
//!   per platform, with structured results for the API layer
//! - **Sub-account fan-out**: Facebook pages and Instagram business
//!   accounts each get their own credential
//! - **Posting client factory**: expiry-aware cache with automatic
//!   refresh and single-flight loading
//! - **Idempotent publishing**: already-published targets are skipped on
//!   retry; one failing target never blocks the rest
//! - **Pluggable storage**: abstract traits for credentials, content,
//!   search indexing, and job scheduling
//!
//! ## Example
//!
//! ```rust,no_run
//! use crosspost::{
//!     AccountUseCases, Config, MemoryCredentialStore, MemoryScheduler, OAuthResolver, Platform,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> crosspost::Result<()> {
//! let config = Config::from_env();
//! let resolver = Arc::new(OAuthResolver::new(&config));
//! let credentials = Arc::new(MemoryCredentialStore::new());
//! let scheduler = Arc::new(MemoryScheduler::new());
//!
//! let accounts = AccountUseCases::new(resolver, credentials, scheduler);
//! let url = accounts.authorization_url(Platform::Twitter, "state-token")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connect;
pub mod content;
pub mod credential;
pub mod error;
pub mod memory;
pub mod oauth;
pub mod platform;
pub mod posting;
pub mod publish;
pub mod state;
pub mod store;

pub use config::{Config, OAuthAppConfig};
pub use connect::{AccountUseCases, ConnectResult, RefreshResult, RevokeResult};
pub use content::{PostContent, PublishOutcome, PublishTarget, TargetStatus};
pub use credential::Credential;
pub use error::{Error, Result};
pub use memory::{MemoryContentStore, MemoryCredentialStore, MemoryScheduler, NullIndexer};
pub use oauth::{OAuthAdapter, OAuthResolver, SubAccount, TokenExchangeResult};
pub use platform::Platform;
pub use posting::{PostingAdapter, PostingAdapterFactory, PostingClientBuilder};
pub use publish::{PublishUseCase, TargetOutcome};
pub use state::generate_state_token;
pub use store::{ContentStore, CredentialStore, JobScheduler, RefreshedToken, SearchIndexer};
