use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
};
use chrono::{DateTime, Duration, Utc};
use crosspost::{
    AccountUseCases, ConnectResult, CredentialStore, Platform, PostContent, PublishUseCase,
    RefreshResult, RevokeResult, TargetOutcome, generate_state_token,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::store::SqliteContentStore;

/// A login attempt awaiting its callback. Expires after ten minutes.
struct PendingAuth {
    user_id: String,
    created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountUseCases>,
    pub publisher: Arc<PublishUseCase>,
    pub credentials: Arc<dyn CredentialStore>,
    pub contents: Arc<SqliteContentStore>,
    pending: Arc<Mutex<HashMap<String, PendingAuth>>>,
}

impl AppState {
    pub fn new(
        accounts: Arc<AccountUseCases>,
        publisher: Arc<PublishUseCase>,
        credentials: Arc<dyn CredentialStore>,
        contents: Arc<SqliteContentStore>,
    ) -> Self {
        Self {
            accounts,
            publisher,
            credentials,
            contents,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

fn parse_platform(raw: &str) -> Result<Platform, (StatusCode, String)> {
    Platform::from_str(raw).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

#[derive(Deserialize)]
pub struct AuthorizeQuery {
    user_id: String,
}

pub async fn authorize(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Redirect, (StatusCode, String)> {
    let platform = parse_platform(&platform)?;
    let token = generate_state_token();
    let url = state
        .accounts
        .authorization_url(platform, &token)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let mut pending = state.pending.lock().unwrap();
    pending.retain(|_, auth| Utc::now() - auth.created_at < Duration::minutes(10));
    pending.insert(
        token,
        PendingAuth {
            user_id: query.user_id,
            created_at: Utc::now(),
        },
    );

    Ok(Redirect::temporary(url.as_str()))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: String,
    state: String,
}

pub async fn callback(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<ConnectResult>, (StatusCode, String)> {
    let platform = parse_platform(&platform)?;
    let user_id = {
        let mut pending = state.pending.lock().unwrap();
        match pending.remove(&query.state) {
            Some(auth) if Utc::now() - auth.created_at < Duration::minutes(10) => auth.user_id,
            _ => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    "unknown or expired state token".to_string(),
                ));
            }
        }
    };

    let result = state.accounts.connect(&user_id, platform, &query.code).await;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct AccountRequest {
    user_id: String,
}

pub async fn refresh(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Json(req): Json<AccountRequest>,
) -> Result<Json<RefreshResult>, (StatusCode, String)> {
    let platform = parse_platform(&platform)?;
    Ok(Json(state.accounts.refresh(&req.user_id, platform).await))
}

pub async fn disconnect(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Json(req): Json<AccountRequest>,
) -> Result<Json<RevokeResult>, (StatusCode, String)> {
    let platform = parse_platform(&platform)?;
    Ok(Json(state.accounts.revoke(&req.user_id, platform).await))
}

/// Token-free view of a credential, safe to return to clients.
#[derive(Serialize)]
pub struct AccountView {
    platform: Platform,
    open_id: String,
    display_name: Option<String>,
    expires_at: DateTime<Utc>,
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<AccountRequest>,
) -> Result<Json<Vec<AccountView>>, (StatusCode, String)> {
    let credentials = state
        .credentials
        .get_all_by_user(&query.user_id)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let views = credentials
        .into_iter()
        .map(|c| AccountView {
            platform: c.platform,
            open_id: c.open_id,
            display_name: c.display_name,
            expires_at: c.expires_at,
        })
        .collect();
    Ok(Json(views))
}

#[derive(Deserialize)]
pub struct CreateContentRequest {
    user_id: String,
    title: Option<String>,
    body: String,
    link: Option<String>,
    #[serde(default)]
    media_urls: Vec<String>,
    platforms: Vec<Platform>,
}

#[derive(Serialize)]
pub struct CreateContentResponse {
    id: String,
}

pub async fn create_content(
    State(state): State<AppState>,
    Json(req): Json<CreateContentRequest>,
) -> Result<Json<CreateContentResponse>, (StatusCode, String)> {
    let mut content = PostContent::new(generate_state_token(), req.user_id, req.body);
    content.title = req.title;
    content.link = req.link;
    content.media_urls = req.media_urls;
    for platform in req.platforms {
        content = content.with_target(platform);
    }
    state
        .contents
        .insert(&content)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(CreateContentResponse { id: content.id }))
}

#[derive(Deserialize)]
pub struct PublishRequest {
    content_id: String,
    user_id: String,
}

pub async fn publish(
    State(state): State<AppState>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<Vec<TargetOutcome>>, (StatusCode, String)> {
    state
        .publisher
        .publish(&req.content_id, &req.user_id)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
