use sqlx::{postgres::PgPoolOptions, PgPool};

/// Creates the PostgreSQL pool shared by the catalog, profile and interaction stores
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    tracing::info!(max_connections, "Database pool ready");

    Ok(pool)
}
