//! Database error types.

use std::time::Duration;

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// The database did not become reachable within the configured window.
    #[error("database not reachable after {waited:?}: {last_error}")]
    ConnectTimeout { waited: Duration, last_error: String },

    /// Failed to begin a transaction.
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Failed to commit a transaction.
    #[error("failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),

    /// Failed to roll back a transaction.
    #[error("failed to roll back transaction: {0}")]
    Rollback(#[source] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error("migration directory not found; tried {tried}. Last error: {last_error}. Run from repo root or services/indexer.")]
    MigrationDirNotFound { tried: String, last_error: String },

    /// Failure injected by the in-memory store.
    #[error("injected {operation} failure")]
    Injected { operation: &'static str },
}
