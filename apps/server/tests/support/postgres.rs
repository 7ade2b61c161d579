//! PostgreSQL-backed test app.
//!
//! Each app gets its own schema on the database named by `DATABASE_URL`, runs
//! the migrations into it, and drops it afterwards. Without `DATABASE_URL` the
//! tests using it are skipped.

use super::{admin_token, bearer, init_tracing, send, send_upload, test_config};
use anyhow::Context as _;
use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode},
    Router,
};
use eo_registry::{api::create_router, AppState, Config};
use futures::FutureExt as _;
use sqlx::Connection as _;
use url::Url;
use uuid::Uuid;

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

pub struct PgTestApp {
    pub router: Router,
    pub state: AppState,
    schema: String,
    admin_database_url: String,
}

impl PgTestApp {
    pub async fn new_with_config(
        admin_database_url: String,
        configure: impl FnOnce(&mut Config),
    ) -> anyhow::Result<Self> {
        init_tracing();

        let mut config = test_config();
        configure(&mut config);

        let schema = format!("test_{}", Uuid::new_v4().simple());
        let mut admin_conn = sqlx::PgConnection::connect(&admin_database_url)
            .await
            .context("connect admin db for schema create")?;
        sqlx::query(&format!(r#"CREATE SCHEMA "{}""#, schema))
            .execute(&mut admin_conn)
            .await
            .context("create test schema")?;

        config.database.url = with_search_path(&admin_database_url, &schema)?;
        config.database.run_migrations = true;
        config.database.pool_min_size = 0;
        // Tests run in parallel, each with its own pool.
        config.database.pool_max_size = 2;
        config.database.pool_timeout_seconds = 30;

        let state = AppState::new(config)
            .await
            .context("initialize AppState")?;
        let router = create_router(state.clone());

        Ok(Self {
            router,
            state,
            schema,
            admin_database_url,
        })
    }

    pub async fn cleanup(self) -> anyhow::Result<()> {
        if let Some(pool) = &self.state.db_pool {
            pool.close().await;
        }

        let mut admin_conn = sqlx::PgConnection::connect(&self.admin_database_url)
            .await
            .context("connect admin db for schema drop")?;
        sqlx::query(&format!(r#"DROP SCHEMA "{}" CASCADE"#, self.schema))
            .execute(&mut admin_conn)
            .await
            .context("drop test schema")?;

        Ok(())
    }

    /// Send a JSON request as an approved admin.
    pub async fn request(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<Bytes>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        let auth = bearer(&admin_token());
        send(
            &self.router,
            method,
            path_and_query,
            body,
            &[("authorization", &auth)],
        )
        .await
    }

    pub async fn upload(
        &self,
        file_name: &str,
        contents: &[u8],
    ) -> anyhow::Result<(StatusCode, HeaderMap, Bytes)> {
        send_upload(&self.router, &admin_token(), file_name, contents).await
    }
}

pub async fn with_pg_test_app<F>(f: F) -> anyhow::Result<()>
where
    F: for<'a> FnOnce(
        &'a PgTestApp,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>,
    >,
{
    let Ok(admin_database_url) = std::env::var(DATABASE_URL_ENV) else {
        eprintln!("{DATABASE_URL_ENV} is not set; skipping PostgreSQL test");
        return Ok(());
    };

    let app = PgTestApp::new_with_config(admin_database_url, |_| {}).await?;

    let result = std::panic::AssertUnwindSafe(f(&app)).catch_unwind().await;
    let cleanup_result = app.cleanup().await;

    if let Err(e) = cleanup_result {
        eprintln!("test schema cleanup failed: {e:?}");
    }

    match result {
        Ok(r) => r,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

fn with_search_path(database_url: &str, schema: &str) -> anyhow::Result<String> {
    let mut url = Url::parse(database_url).context("parse database URL")?;
    url.query_pairs_mut()
        .append_pair("options", &format!("-c search_path={}", schema));
    Ok(url.to_string())
}
