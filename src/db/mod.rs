//! Database layer
//!
//! SQLite through sqlx. Schema lives in [`migrations`]; every table is read
//! and written through the traits in [`repositories`].

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, ping, DbPool};

/// In-memory pool with the full schema applied
#[cfg(test)]
pub async fn migrated_test_pool() -> DbPool {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}
