use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

pub async fn init_db(database_url: &SecretString, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url.expose_secret())
        .await
        .map_err(|e| {
            anyhow::anyhow!("Postgres connection failed (check DATABASE_URL/password): {e}")
        })?;

    info!("Connected to database!");

    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Database migration failed: {e}"))?;

    info!("Migrations applied");
    Ok(pool)
}
