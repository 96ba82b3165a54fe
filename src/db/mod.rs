//! Database layer
//!
//! This module handles database access for:
//! - The report registry (registered report requests and their types)
//! - The analytics tables replicated from the alerting platform
//! - Generic filter/sort query building

pub mod analytics_repository;
pub mod query;
pub mod report_repository;

use anyhow::Result;
use sqlx::{Pool, Sqlite};

use crate::config::DatabaseConfig;

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Initialize the database connection pool and run migrations
pub async fn init_pool(config: &DatabaseConfig) -> Result<DbPool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Verify the database answers a trivial query
pub async fn check_health(pool: &DbPool) -> Result<()> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}
