use std::str::FromStr;

use anyhow::Context;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::info;

use crate::config::AppConfig;

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let options = PgConnectOptions::from_str(&config.database_url)
        .context("parse DATABASE_URL")?
        .database(&config.database_name);
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await
        .with_context(|| format!("connect to database {}", config.database_name))?;
    info!(database = %config.database_name, "connected to database");
    Ok(db)
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run database migrations")?;
    Ok(())
}
