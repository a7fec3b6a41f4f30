use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crosspost::{
    Credential, Error, JobScheduler, Platform, PostContent, PublishTarget, RefreshedToken,
    Result as CrossResult,
};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use std::str::FromStr;
use std::time::Duration;

fn storage_err(e: impl std::fmt::Display) -> Error {
    Error::Storage(e.to_string())
}

fn parse_timestamp(raw: &str) -> CrossResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(storage_err)
}

fn credential_from_row(row: &SqliteRow) -> CrossResult<Credential> {
    let platform_str: String = row.try_get("platform").map_err(storage_err)?;
    let expires_at: String = row.try_get("expires_at").map_err(storage_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(storage_err)?;
    Ok(Credential {
        user_id: row.try_get("user_id").map_err(storage_err)?,
        platform: Platform::from_str(&platform_str)?,
        access_token: row.try_get("access_token").map_err(storage_err)?,
        refresh_token: row.try_get("refresh_token").map_err(storage_err)?,
        open_id: row.try_get("open_id").map_err(storage_err)?,
        display_name: row.try_get("display_name").map_err(storage_err)?,
        scope: row.try_get("scope").map_err(storage_err)?,
        expires_at: parse_timestamp(&expires_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[derive(Clone)]
pub struct SqliteCredentialStore {
    db: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn upsert(&self, credential: &Credential) -> CrossResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO credentials
                (user_id, platform, open_id, access_token, refresh_token,
                 display_name, scope, expires_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&credential.user_id)
        .bind(credential.platform.as_str())
        .bind(&credential.open_id)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(&credential.display_name)
        .bind(&credential.scope)
        .bind(credential.expires_at.to_rfc3339())
        .bind(credential.updated_at.to_rfc3339())
        .execute(&self.db)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl crosspost::CredentialStore for SqliteCredentialStore {
    async fn get_by_user_and_platform(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> CrossResult<Option<Credential>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, platform, open_id, access_token, refresh_token,
                   display_name, scope, expires_at, updated_at
            FROM credentials
            WHERE user_id = ? AND platform = ?
            ORDER BY open_id
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(platform.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(storage_err)?;
        row.as_ref().map(credential_from_row).transpose()
    }

    async fn get_by_channel_and_platform(
        &self,
        open_id: &str,
        platform: Platform,
    ) -> CrossResult<Option<Credential>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, platform, open_id, access_token, refresh_token,
                   display_name, scope, expires_at, updated_at
            FROM credentials
            WHERE open_id = ? AND platform = ?
            "#,
        )
        .bind(open_id)
        .bind(platform.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(storage_err)?;
        row.as_ref().map(credential_from_row).transpose()
    }

    async fn get_all_by_user(&self, user_id: &str) -> CrossResult<Vec<Credential>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, platform, open_id, access_token, refresh_token,
                   display_name, scope, expires_at, updated_at
            FROM credentials
            WHERE user_id = ?
            ORDER BY platform, open_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(storage_err)?;
        rows.iter().map(credential_from_row).collect()
    }

    async fn create(&self, credential: Credential) -> CrossResult<()> {
        self.upsert(&credential).await
    }

    async fn update(&self, credential: Credential) -> CrossResult<()> {
        self.upsert(&credential).await
    }

    async fn refresh(
        &self,
        user_id: &str,
        platform: Platform,
        token: RefreshedToken,
    ) -> CrossResult<Credential> {
        let mut credential = self
            .get_by_user_and_platform(user_id, platform)
            .await?
            .ok_or(Error::NotConnected(platform))?;
        credential.access_token = token.access_token;
        if let Some(refresh_token) = token.refresh_token {
            credential.refresh_token = Some(refresh_token);
        }
        credential.expires_at = token.expires_at;
        credential.updated_at = Utc::now();
        self.upsert(&credential).await?;
        Ok(credential)
    }

    async fn delete_by_user_and_platform(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> CrossResult<()> {
        sqlx::query("DELETE FROM credentials WHERE user_id = ? AND platform = ?")
            .bind(user_id)
            .bind(platform.as_str())
            .execute(&self.db)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct SqliteContentStore {
    db: SqlitePool,
}

impl SqliteContentStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn insert(&self, content: &PostContent) -> CrossResult<()> {
        let media_urls = serde_json::to_string(&content.media_urls).map_err(storage_err)?;
        let targets = serde_json::to_string(&content.targets).map_err(storage_err)?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO contents
                (id, user_id, title, body, link, media_urls, targets)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&content.id)
        .bind(&content.user_id)
        .bind(&content.title)
        .bind(&content.body)
        .bind(&content.link)
        .bind(media_urls)
        .bind(targets)
        .execute(&self.db)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl crosspost::ContentStore for SqliteContentStore {
    async fn get_by_id(&self, content_id: &str, user_id: &str) -> CrossResult<Option<PostContent>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, title, body, link, media_urls, targets
            FROM contents
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(content_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(storage_err)?;

        let Some(row) = row else { return Ok(None) };
        let media_urls: String = row.try_get("media_urls").map_err(storage_err)?;
        let targets: String = row.try_get("targets").map_err(storage_err)?;
        Ok(Some(PostContent {
            id: row.try_get("id").map_err(storage_err)?,
            user_id: row.try_get("user_id").map_err(storage_err)?,
            title: row.try_get("title").map_err(storage_err)?,
            body: row.try_get("body").map_err(storage_err)?,
            link: row.try_get("link").map_err(storage_err)?,
            media_urls: serde_json::from_str(&media_urls).map_err(storage_err)?,
            targets: serde_json::from_str(&targets).map_err(storage_err)?,
        }))
    }

    async fn update_targets(
        &self,
        content_id: &str,
        targets: Vec<PublishTarget>,
    ) -> CrossResult<()> {
        let targets = serde_json::to_string(&targets).map_err(storage_err)?;
        sqlx::query("UPDATE contents SET targets = ? WHERE id = ?")
            .bind(targets)
            .bind(content_id)
            .execute(&self.db)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

/// Persists delayed jobs for an out-of-process worker to pick up.
#[derive(Clone)]
pub struct SqliteScheduler {
    db: SqlitePool,
}

impl SqliteScheduler {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobScheduler for SqliteScheduler {
    async fn schedule(
        &self,
        queue: &str,
        job: &str,
        payload: serde_json::Value,
        delay: Duration,
    ) -> CrossResult<()> {
        let run_at = Utc::now() + chrono::Duration::from_std(delay).map_err(storage_err)?;
        sqlx::query(
            r#"
            INSERT INTO scheduled_jobs (queue, job, payload, run_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(queue)
        .bind(job)
        .bind(payload.to_string())
        .bind(run_at.to_rfc3339())
        .execute(&self.db)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}
