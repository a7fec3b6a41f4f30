//! End-to-end tests of the connect, factory, and publish pipeline against
//! in-memory stores and scripted platform adapters.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use crosspost::{
    AccountUseCases, Credential, CredentialStore, Error, MemoryContentStore, MemoryCredentialStore,
    MemoryScheduler, NullIndexer, OAuthAdapter, OAuthResolver, Platform, PostContent,
    PostingAdapter, PostingAdapterFactory, PostingClientBuilder, PublishOutcome, PublishUseCase,
    Result, SubAccount, TargetStatus, TokenExchangeResult,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

/// Scripted OAuth adapter with call counters.
struct MockOAuth {
    platform: Platform,
    exchange: Option<TokenExchangeResult>,
    subs: Vec<SubAccount>,
    refresh_result: std::result::Result<TokenExchangeResult, String>,
    refresh_delay: Option<Duration>,
    refresh_calls: AtomicUsize,
    last_refresh_input: std::sync::Mutex<Option<String>>,
    revoke_fails: bool,
    revoke_calls: AtomicUsize,
}

impl MockOAuth {
    fn new(platform: Platform) -> Self {
        Self {
            platform,
            exchange: None,
            subs: Vec::new(),
            refresh_result: Ok(token("refreshed-token", 3600)),
            refresh_delay: None,
            refresh_calls: AtomicUsize::new(0),
            last_refresh_input: std::sync::Mutex::new(None),
            revoke_fails: false,
            revoke_calls: AtomicUsize::new(0),
        }
    }
}

fn token(access_token: &str, expires_in: i64) -> TokenExchangeResult {
    TokenExchangeResult {
        access_token: access_token.to_string(),
        refresh_token: None,
        expires_in,
        scope: None,
        provider_account_id: Some("acct-1".to_string()),
        raw: None,
    }
}

#[async_trait]
impl OAuthAdapter for MockOAuth {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn authorization_url(&self, state: &str) -> Result<Url> {
        Ok(format!("https://auth.example.com/?state={state}")
            .parse()
            .unwrap())
    }

    async fn verify_access_token(&self, _token: &str) -> Result<bool> {
        Ok(true)
    }

    fn supports_exchange(&self) -> bool {
        self.exchange.is_some()
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenExchangeResult> {
        self.exchange.clone().ok_or(Error::UnsupportedOperation {
            platform: self.platform,
            operation: "code exchange",
        })
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    async fn refresh_token(&self, current: &str) -> Result<TokenExchangeResult> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_input.lock().unwrap() = Some(current.to_string());
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        self.refresh_result.clone().map_err(Error::Refresh)
    }

    fn supports_revoke(&self) -> bool {
        true
    }

    async fn revoke_token(
        &self,
        _access_token: &str,
        _refresh_token: Option<&str>,
    ) -> Result<bool> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        if self.revoke_fails {
            Err(Error::Network("provider unreachable".to_string()))
        } else {
            Ok(true)
        }
    }

    fn sub_accounts(&self, _raw: &serde_json::Value) -> Vec<SubAccount> {
        self.subs.clone()
    }
}

/// Posting double that records publish calls per platform.
struct MockPoster {
    platform: Platform,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl PostingAdapter for MockPoster {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn publish(&self, _content: &PostContent) -> Result<PublishOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(Error::PublishTarget {
                platform: self.platform,
                message: "simulated outage".to_string(),
            })
        } else {
            Ok(PublishOutcome {
                external_post_id: format!("{}-post-1", self.platform),
                permalink: Some(format!("https://example.com/{}", self.platform)),
            })
        }
    }
}

/// Builder double counting how many clients get constructed.
struct CountingBuilder {
    builds: Arc<AtomicUsize>,
    publish_calls: Arc<AtomicUsize>,
    failing: Vec<Platform>,
}

impl CountingBuilder {
    fn new() -> Self {
        Self {
            builds: Arc::new(AtomicUsize::new(0)),
            publish_calls: Arc::new(AtomicUsize::new(0)),
            failing: Vec::new(),
        }
    }
}

impl PostingClientBuilder for CountingBuilder {
    fn build(&self, credential: &Credential) -> Result<Arc<dyn PostingAdapter>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockPoster {
            platform: credential.platform,
            fail: self.failing.contains(&credential.platform),
            calls: self.publish_calls.clone(),
        }))
    }
}

fn credential(platform: Platform, expires_in_secs: i64) -> Credential {
    let mut cred = Credential::new(
        "user-1",
        platform,
        "old-token",
        "acct-1",
        Utc::now() + ChronoDuration::seconds(expires_in_secs),
    );
    cred.refresh_token = Some("old-refresh".to_string());
    cred
}

fn resolver_with(adapter: Arc<MockOAuth>) -> Arc<OAuthResolver> {
    Arc::new(OAuthResolver::from_adapters([
        adapter as Arc<dyn OAuthAdapter>
    ]))
}

#[tokio::test]
async fn factory_reuses_cached_client_while_credential_is_fresh() {
    let store = Arc::new(MemoryCredentialStore::new());
    store
        .create(credential(Platform::Twitter, 3600))
        .await
        .unwrap();
    let adapter = Arc::new(MockOAuth::new(Platform::Twitter));
    let builder = Arc::new(CountingBuilder::new());
    let builds = builder.builds.clone();
    let factory = PostingAdapterFactory::with_builder(resolver_with(adapter), store, builder);

    let first = factory.create(Platform::Twitter, "user-1").await.unwrap();
    let second = factory.create(Platform::Twitter, "user-1").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_credential_is_refreshed_exactly_once() {
    let store = Arc::new(MemoryCredentialStore::new());
    store
        .create(credential(Platform::Twitter, -60))
        .await
        .unwrap();
    let adapter = Arc::new(MockOAuth::new(Platform::Twitter));
    let factory = PostingAdapterFactory::with_builder(
        resolver_with(adapter.clone()),
        store.clone(),
        Arc::new(CountingBuilder::new()),
    );

    factory.create(Platform::Twitter, "user-1").await.unwrap();

    assert_eq!(adapter.refresh_calls.load(Ordering::SeqCst), 1);
    let stored = store
        .get_by_user_and_platform("user-1", Platform::Twitter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "refreshed-token");
    assert!(stored.expires_at > Utc::now());
}

#[tokio::test]
async fn token_reuse_platform_refreshes_from_its_access_token() {
    let store = Arc::new(MemoryCredentialStore::new());
    // Facebook-style credential: long-lived access token, no refresh token.
    let mut cred = credential(Platform::Facebook, -60);
    cred.refresh_token = None;
    store.create(cred).await.unwrap();
    let adapter = Arc::new(MockOAuth::new(Platform::Facebook));
    let factory = PostingAdapterFactory::with_builder(
        resolver_with(adapter.clone()),
        store,
        Arc::new(CountingBuilder::new()),
    );

    factory.create(Platform::Facebook, "user-1").await.unwrap();

    assert_eq!(
        adapter.last_refresh_input.lock().unwrap().as_deref(),
        Some("old-token"),
        "without a refresh token the access token is re-exchanged"
    );
}

#[tokio::test]
async fn failed_refresh_requires_reconnect() {
    let store = Arc::new(MemoryCredentialStore::new());
    store
        .create(credential(Platform::Linkedin, -60))
        .await
        .unwrap();
    let mut adapter = MockOAuth::new(Platform::Linkedin);
    adapter.refresh_result = Err("invalid_grant".to_string());
    let factory = PostingAdapterFactory::with_builder(
        resolver_with(Arc::new(adapter)),
        store,
        Arc::new(CountingBuilder::new()),
    );

    let err = factory
        .create(Platform::Linkedin, "user-1")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ReauthenticationRequired {
            platform: Platform::Linkedin
        }
    ));
    assert!(err.to_string().contains("reconnect your linkedin account"));
}

#[tokio::test]
async fn concurrent_creates_share_one_refresh() {
    let store = Arc::new(MemoryCredentialStore::new());
    store
        .create(credential(Platform::Twitter, -60))
        .await
        .unwrap();
    let mut adapter = MockOAuth::new(Platform::Twitter);
    adapter.refresh_delay = Some(Duration::from_millis(50));
    let adapter = Arc::new(adapter);
    let builder = Arc::new(CountingBuilder::new());
    let builds = builder.builds.clone();
    let factory = Arc::new(PostingAdapterFactory::with_builder(
        resolver_with(adapter.clone()),
        store,
        builder,
    ));

    let a = {
        let factory = factory.clone();
        tokio::spawn(async move { factory.create(Platform::Twitter, "user-1").await })
    };
    let b = {
        let factory = factory.clone();
        tokio::spawn(async move { factory.create(Platform::Twitter, "user-1").await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(adapter.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn connect_persists_single_account_and_schedules_recheck() {
    let store = Arc::new(MemoryCredentialStore::new());
    let scheduler = Arc::new(MemoryScheduler::new());
    let mut adapter = MockOAuth::new(Platform::Twitter);
    adapter.exchange = Some(token("fresh-token", 7200));
    let accounts = AccountUseCases::new(
        resolver_with(Arc::new(adapter)),
        store.clone(),
        scheduler.clone(),
    );

    let result = accounts.connect("user-1", Platform::Twitter, "code").await;

    assert!(result.success, "{}", result.message);
    let stored = store
        .get_by_user_and_platform("user-1", Platform::Twitter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "fresh-token");
    assert_eq!(stored.open_id, "acct-1");
    assert_eq!(scheduler.jobs().len(), 1);
    assert_eq!(scheduler.jobs()[0].job, "expiry_recheck");
}

#[tokio::test]
async fn connect_fans_out_only_to_eligible_sub_accounts() {
    let store = Arc::new(MemoryCredentialStore::new());
    let mut adapter = MockOAuth::new(Platform::Instagram);
    let mut exchange = token("login-token", 7200);
    exchange.raw = Some(json!({ "pages": [] }));
    adapter.exchange = Some(exchange);
    adapter.subs = vec![
        SubAccount {
            open_id: "page-a".to_string(),
            display_name: Some("Page A".to_string()),
            access_token: "page-a-token".to_string(),
            expires_in: None,
            eligible: false,
        },
        SubAccount {
            open_id: "ig-biz-1".to_string(),
            display_name: Some("Page B".to_string()),
            access_token: "page-b-token".to_string(),
            expires_in: Some(3600),
            eligible: true,
        },
        SubAccount {
            open_id: "page-c".to_string(),
            display_name: None,
            access_token: "page-c-token".to_string(),
            expires_in: None,
            eligible: false,
        },
    ];
    let accounts = AccountUseCases::new(
        resolver_with(Arc::new(adapter)),
        store.clone(),
        Arc::new(MemoryScheduler::new()),
    );

    let result = accounts.connect("user-1", Platform::Instagram, "code").await;

    assert!(result.success, "{}", result.message);
    let all = store.get_all_by_user("user-1").await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].open_id, "ig-biz-1");
    assert_eq!(all[0].access_token, "page-b-token");
}

#[tokio::test]
async fn connect_fails_when_no_sub_account_is_eligible() {
    let store = Arc::new(MemoryCredentialStore::new());
    let mut adapter = MockOAuth::new(Platform::Instagram);
    let mut exchange = token("login-token", 7200);
    exchange.raw = Some(json!({ "pages": [] }));
    adapter.exchange = Some(exchange);
    adapter.subs = vec![SubAccount {
        open_id: "page-a".to_string(),
        display_name: None,
        access_token: "page-a-token".to_string(),
        expires_in: None,
        eligible: false,
    }];
    let accounts = AccountUseCases::new(
        resolver_with(Arc::new(adapter)),
        store.clone(),
        Arc::new(MemoryScheduler::new()),
    );

    let result = accounts.connect("user-1", Platform::Instagram, "code").await;

    assert!(!result.success);
    assert!(result.message.contains("sub-accounts"));
    assert!(store.get_all_by_user("user-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn connect_on_unregistered_platform_fails_cleanly() {
    let accounts = AccountUseCases::new(
        Arc::new(OAuthResolver::from_adapters([])),
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(MemoryScheduler::new()),
    );

    let result = accounts.connect("user-1", Platform::Facebook, "code").await;

    assert!(!result.success);
    assert_eq!(result.message, "platform not supported: facebook");
}

#[tokio::test]
async fn refresh_keeps_previous_refresh_token_when_provider_omits_one() {
    let store = Arc::new(MemoryCredentialStore::new());
    store
        .create(credential(Platform::Youtube, 3600))
        .await
        .unwrap();
    let adapter = Arc::new(MockOAuth::new(Platform::Youtube));
    let accounts = AccountUseCases::new(
        resolver_with(adapter),
        store.clone(),
        Arc::new(MemoryScheduler::new()),
    );

    let result = accounts.refresh("user-1", Platform::Youtube).await;

    assert!(result.success, "{}", result.message);
    let stored = result.credential.unwrap();
    assert_eq!(stored.access_token, "refreshed-token");
    assert_eq!(stored.refresh_token.as_deref(), Some("old-refresh"));
}

#[tokio::test]
async fn revoke_deletes_locally_even_when_provider_revoke_fails() {
    let store = Arc::new(MemoryCredentialStore::new());
    store
        .create(credential(Platform::Facebook, 3600))
        .await
        .unwrap();
    let mut adapter = MockOAuth::new(Platform::Facebook);
    adapter.revoke_fails = true;
    let adapter = Arc::new(adapter);
    let accounts = AccountUseCases::new(
        resolver_with(adapter.clone()),
        store.clone(),
        Arc::new(MemoryScheduler::new()),
    );

    let result = accounts.revoke("user-1", Platform::Facebook).await;

    assert!(result.success);
    assert!(!result.provider_revoked);
    assert_eq!(adapter.revoke_calls.load(Ordering::SeqCst), 1);
    assert!(
        store
            .get_by_user_and_platform("user-1", Platform::Facebook)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn revoke_without_connection_reports_not_connected() {
    let adapter = Arc::new(MockOAuth::new(Platform::Facebook));
    let accounts = AccountUseCases::new(
        resolver_with(adapter.clone()),
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(MemoryScheduler::new()),
    );

    let result = accounts.revoke("user-1", Platform::Facebook).await;

    assert!(!result.success);
    assert_eq!(result.message, "facebook account not connected");
    assert_eq!(adapter.revoke_calls.load(Ordering::SeqCst), 0);
}

async fn publish_fixture(
    platforms: &[Platform],
    failing: Vec<Platform>,
) -> (PublishUseCase, MemoryContentStore, Arc<AtomicUsize>) {
    let credentials = Arc::new(MemoryCredentialStore::new());
    let contents = MemoryContentStore::new();
    let mut post = PostContent::new("post-1", "user-1", "hello world");
    for &platform in platforms {
        post = post.with_target(platform);
    }
    contents.insert(post);

    let mut adapters: Vec<Arc<dyn OAuthAdapter>> = Vec::new();
    for &platform in platforms {
        adapters.push(Arc::new(MockOAuth::new(platform)));
        credentials.create(credential(platform, 3600)).await.unwrap();
    }
    let mut builder = CountingBuilder::new();
    builder.failing = failing;
    let publish_calls = builder.publish_calls.clone();
    let factory = Arc::new(PostingAdapterFactory::with_builder(
        Arc::new(OAuthResolver::from_adapters(adapters)),
        credentials,
        Arc::new(builder),
    ));
    let use_case = PublishUseCase::new(
        factory,
        Arc::new(contents.clone()),
        Arc::new(NullIndexer),
    );
    (use_case, contents, publish_calls)
}

#[tokio::test]
async fn publish_records_per_target_outcomes_on_partial_failure() {
    let platforms = [Platform::Facebook, Platform::Twitter, Platform::Linkedin];
    let (use_case, contents, _) = publish_fixture(&platforms, vec![Platform::Twitter]).await;

    let outcomes = use_case.publish("post-1", "user-1").await.unwrap();

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].status, TargetStatus::Published);
    assert_eq!(outcomes[1].status, TargetStatus::Failed);
    assert!(outcomes[1].error.as_deref().unwrap().contains("simulated outage"));
    assert_eq!(outcomes[2].status, TargetStatus::Published);
    assert_eq!(
        outcomes[0].external_post_id.as_deref(),
        Some("facebook-post-1")
    );

    use crosspost::ContentStore;
    let stored = contents
        .get_by_id("post-1", "user-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.targets[1].status, TargetStatus::Failed);
}

#[tokio::test]
async fn republish_skips_already_published_targets() {
    let platforms = [Platform::Facebook, Platform::Twitter];
    let (use_case, _, publish_calls) = publish_fixture(&platforms, vec![Platform::Twitter]).await;

    let first = use_case.publish("post-1", "user-1").await.unwrap();
    assert_eq!(first[0].status, TargetStatus::Published);
    assert_eq!(first[1].status, TargetStatus::Failed);
    assert_eq!(publish_calls.load(Ordering::SeqCst), 2);

    // Second run retries only the failed target.
    let second = use_case.publish("post-1", "user-1").await.unwrap();
    assert_eq!(second[0].status, TargetStatus::Published);
    assert_eq!(publish_calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        second[0].external_post_id, first[0].external_post_id,
        "published target keeps its original outcome"
    );
}

#[tokio::test]
async fn republish_of_fully_published_content_makes_no_adapter_calls() {
    let platforms = [Platform::Facebook, Platform::Twitter];
    let (use_case, _, publish_calls) = publish_fixture(&platforms, vec![]).await;

    let first = use_case.publish("post-1", "user-1").await.unwrap();
    assert!(first.iter().all(|o| o.status == TargetStatus::Published));
    assert_eq!(publish_calls.load(Ordering::SeqCst), 2);

    let second = use_case.publish("post-1", "user-1").await.unwrap();

    assert_eq!(publish_calls.load(Ordering::SeqCst), 2);
    assert_eq!(second.len(), first.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.status, b.status);
        assert_eq!(a.external_post_id, b.external_post_id);
        assert_eq!(a.permalink, b.permalink);
    }
}

#[tokio::test]
async fn publish_of_unknown_content_is_a_storage_error() {
    let (use_case, _, _) = publish_fixture(&[Platform::Facebook], vec![]).await;

    let err = use_case.publish("missing", "user-1").await.unwrap_err();

    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(err.to_string(), "storage error: content missing not found");
}

#[tokio::test]
async fn publish_without_connected_account_fails_that_target_only() {
    let credentials = Arc::new(MemoryCredentialStore::new());
    credentials
        .create(credential(Platform::Facebook, 3600))
        .await
        .unwrap();
    let contents = MemoryContentStore::new();
    contents.insert(
        PostContent::new("post-1", "user-1", "hello")
            .with_target(Platform::Facebook)
            .with_target(Platform::Twitter),
    );
    let adapters: Vec<Arc<dyn OAuthAdapter>> = vec![
        Arc::new(MockOAuth::new(Platform::Facebook)),
        Arc::new(MockOAuth::new(Platform::Twitter)),
    ];
    let factory = Arc::new(PostingAdapterFactory::with_builder(
        Arc::new(OAuthResolver::from_adapters(adapters)),
        credentials,
        Arc::new(CountingBuilder::new()),
    ));
    let use_case = PublishUseCase::new(factory, Arc::new(contents), Arc::new(NullIndexer));

    let outcomes = use_case.publish("post-1", "user-1").await.unwrap();

    assert_eq!(outcomes[0].status, TargetStatus::Published);
    assert_eq!(outcomes[1].status, TargetStatus::Failed);
    assert_eq!(
        outcomes[1].error.as_deref(),
        Some("twitter account not connected")
    );
}
