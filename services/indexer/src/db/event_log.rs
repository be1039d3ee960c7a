//! Event log storage.
//!
//! The event log is a single append-only table. Each recorded event is written
//! inside its own transaction so a failed insert never leaves a partial row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dataone_events::{EventKind, Message};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::DbError;

/// The statement used to add an event to the log.
const INSERT_EVENT: &str = r#"
INSERT INTO event_log (permanent_id, irods_path, event, date_logged, node_identifier)
VALUES ($1, $2, $3, $4, $5)
"#;

/// A row in the `event_log` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogRow {
    pub entity: String,
    pub path: String,
    pub event_kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    pub node_identifier: String,
}

impl EventLogRow {
    /// Build the row for a message.
    ///
    /// Messages without a timestamp are stamped with the current time.
    pub fn from_message(msg: &Message, event_kind: EventKind, node_identifier: &str) -> Self {
        Self {
            entity: msg.entity.clone(),
            path: msg.path.clone(),
            event_kind,
            occurred_at: msg.timestamp.unwrap_or_else(Utc::now),
            node_identifier: node_identifier.to_string(),
        }
    }
}

/// Transactional access to the event log.
#[async_trait]
pub trait EventLogStore: Send + Sync + 'static {
    /// An open transaction.
    type Tx: Send + 'static;

    /// Begin a new transaction.
    async fn begin(&self) -> Result<Self::Tx, DbError>;

    /// Insert one row within `tx`.
    async fn insert_event(&self, tx: &mut Self::Tx, row: &EventLogRow) -> Result<(), DbError>;

    /// Commit `tx`, making its rows durable.
    async fn commit(&self, tx: Self::Tx) -> Result<(), DbError>;

    /// Roll back `tx`, discarding its rows.
    async fn rollback(&self, tx: Self::Tx) -> Result<(), DbError>;
}

/// Event log backed by Postgres.
#[derive(Clone)]
pub struct PgEventLog {
    pool: PgPool,
}

impl PgEventLog {
    /// Create a new event log handle.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Count rows for an entity. Used by operational checks and tests.
    pub async fn count_for_entity(&self, entity: &str) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_log WHERE permanent_id = $1")
            .bind(entity)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(count)
    }
}

#[async_trait]
impl EventLogStore for PgEventLog {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, DbError> {
        self.pool.begin().await.map_err(DbError::Begin)
    }

    async fn insert_event(&self, tx: &mut Self::Tx, row: &EventLogRow) -> Result<(), DbError> {
        debug!(
            entity = %row.entity,
            path = %row.path,
            event = %row.event_kind,
            "Inserting event into event_log"
        );

        sqlx::query(INSERT_EVENT)
            .bind(&row.entity)
            .bind(&row.path)
            .bind(row.event_kind.as_str())
            .bind(row.occurred_at)
            .bind(&row.node_identifier)
            .execute(&mut **tx)
            .await
            .map_err(DbError::Query)?;

        Ok(())
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), DbError> {
        tx.commit().await.map_err(DbError::Commit)
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), DbError> {
        tx.rollback().await.map_err(DbError::Rollback)
    }
}
