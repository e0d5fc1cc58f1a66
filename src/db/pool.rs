//! SQLite connection pool
//!
//! Accepts a plain file path, a `sqlite:` URL or `:memory:`. Parent directories
//! of file databases are created on demand.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::config::DatabaseConfig;

/// Pool type shared by every repository
pub type DbPool = SqlitePool;

/// Turn a configured location into a sqlx connection URL
fn connection_url(url: &str) -> String {
    if url == ":memory:" || url == "sqlite::memory:" {
        "sqlite::memory:".to_string()
    } else if url.starts_with("sqlite:") {
        if url.contains('?') {
            url.to_string()
        } else {
            format!("{}?mode=rwc", url)
        }
    } else {
        format!("sqlite:{}?mode=rwc", url)
    }
}

fn ensure_parent_dir(url: &str) -> Result<()> {
    if url.contains(":memory:") {
        return Ok(());
    }
    let path = url.trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }
    }
    Ok(())
}

/// Create the connection pool described by `config`
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    ensure_parent_dir(&config.url)?;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect(&connection_url(&config.url))
        .await
        .with_context(|| format!("Failed to connect to SQLite database: {}", config.url))?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .context("Failed to enable foreign keys")?;

    Ok(pool)
}

/// Check that the database answers
pub async fn ping(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Database ping failed")?;
    Ok(())
}

/// In-memory database for tests
pub async fn create_test_pool() -> Result<DbPool> {
    let config = DatabaseConfig {
        url: ":memory:".to_string(),
        ..Default::default()
    };
    create_pool(&config).await
}
