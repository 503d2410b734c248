//! Database layer for data persistence and access.
//!
//! The only table this service reads is `projects`; it is looked up inside a transaction that
//! brackets each generation request so the handler can commit or roll back alongside the rest of
//! the system.
//!
//! # Modules
//!
//! - [`handlers`]: The [`handlers::ProjectStore`] abstraction and its Postgres implementation
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types

pub mod errors;
pub mod handlers;
pub mod models;

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;

/// Connect to Postgres and run the embedded migrations.
pub async fn setup_database(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.url)
        .await?;

    crate::migrator().run(&pool).await?;
    info!("Database migrations applied");

    Ok(pool)
}
