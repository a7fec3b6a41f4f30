use axum::{
    Router,
    routing::{get, post},
};
use crosspost::{AccountUseCases, Config, OAuthResolver, PostingAdapterFactory, PublishUseCase};
use miette::{IntoDiagnostic, Result};
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

mod indexer;
mod routes;
mod store;

async fn init_db(db_url: &str) -> Result<SqlitePool> {
    let pool = SqlitePool::connect(db_url).await.into_diagnostic()?;

    let migration_sql = include_str!("../migrations/001_initial_schema.sql");
    sqlx::raw_sql(migration_sql)
        .execute(&pool)
        .await
        .into_diagnostic()?;

    Ok(pool)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let db_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:crosspost.db".to_string());
    let pool = init_db(&db_url).await?;

    let config = Config::from_env();
    let resolver = Arc::new(OAuthResolver::new(&config));
    tracing::info!(platforms = ?resolver.platforms(), "oauth apps configured");

    let credentials = Arc::new(store::SqliteCredentialStore::new(pool.clone()));
    let contents = Arc::new(store::SqliteContentStore::new(pool.clone()));
    let scheduler = Arc::new(store::SqliteScheduler::new(pool.clone()));
    let search = Arc::new(indexer::LoggingIndexer);

    let accounts = Arc::new(AccountUseCases::new(
        resolver.clone(),
        credentials.clone(),
        scheduler,
    ));
    let factory = Arc::new(PostingAdapterFactory::new(resolver, credentials.clone()));
    let publisher = Arc::new(PublishUseCase::new(factory, contents.clone(), search));

    let state = routes::AppState::new(accounts, publisher, credentials, contents);

    let app = Router::new()
        .route("/connect/{platform}/authorize", get(routes::authorize))
        .route("/connect/{platform}/callback", get(routes::callback))
        .route("/connect/{platform}/refresh", post(routes::refresh))
        .route("/connect/{platform}/disconnect", post(routes::disconnect))
        .route("/accounts", get(routes::list_accounts))
        .route("/contents", post(routes::create_content))
        .route("/publish", post(routes::publish))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .into_diagnostic()?;
    tracing::info!("listening on 0.0.0.0:3000");
    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}
