use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Open the process-wide connection pool. Queries acquire a connection per
/// statement and return it to the pool when done.
pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")
}

pub async fn migrate(pool: &PgPool) {
    if let Err(e) = sqlx::migrate!("./migrations").run(pool).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }
}
