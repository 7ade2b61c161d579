//! Shared application state handed to every handler.

use anyhow::Context;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    api::middleware::RateLimiter,
    auth::AuthManager,
    config::Config,
    db::{CertificateStore, PostgresCertificateStore},
    services::{BulkImporter, CertificateService, StatsService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` when the state runs over a non-Postgres store.
    pub db_pool: Option<PgPool>,
    pub store: Arc<dyn CertificateStore>,
    pub certificates: Arc<CertificateService>,
    pub importer: Arc<BulkImporter>,
    pub stats: Arc<StatsService>,
    pub auth: AuthManager,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Connect to Postgres, apply migrations when configured, and wire services.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = connect(&config).await?;

        if config.database.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");
        }

        let store: Arc<dyn CertificateStore> = Arc::new(PostgresCertificateStore::new(pool.clone()));
        let mut state = Self::with_store(config, store)?;
        state.db_pool = Some(pool);
        Ok(state)
    }

    /// Wire services over an already constructed store.
    pub fn with_store(config: Config, store: Arc<dyn CertificateStore>) -> anyhow::Result<Self> {
        let auth = AuthManager::from_config(&config.auth)
            .map_err(|e| anyhow::anyhow!("Failed to initialize authentication: {e:?}"))?;

        let certificates = Arc::new(CertificateService::new(store.clone(), config.query.clone()));
        let importer = Arc::new(BulkImporter::new(store.clone(), config.import.clone()));
        let stats = Arc::new(StatsService::new(store.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Ok(Self {
            config: Arc::new(config),
            db_pool: None,
            store,
            certificates,
            importer,
            stats,
            auth,
            rate_limiter,
        })
    }
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    let db = &config.database;
    tracing::info!(
        min_connections = db.pool_min_size,
        max_connections = db.pool_max_size,
        "Connecting to database"
    );

    PgPoolOptions::new()
        .min_connections(db.pool_min_size)
        .max_connections(db.pool_max_size)
        .acquire_timeout(Duration::from_secs(db.pool_timeout_seconds))
        .connect(&db.url)
        .await
        .context("Failed to connect to database")
}
