use secrecy::SecretString;

use crate::{adapters::persistence::PostgresPersistence, infra::db::init_db};

pub mod app;
pub mod config;
pub mod db;
pub mod expiry_sweeper;
pub mod setup;

pub async fn postgres_persistence(
    database_url: &SecretString,
    max_connections: u32,
) -> anyhow::Result<PostgresPersistence> {
    let pool = init_db(database_url, max_connections).await?;
    let persistence = PostgresPersistence::new(pool);
    Ok(persistence)
}
