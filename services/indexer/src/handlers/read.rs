//! Read event handler.
//!
//! Records a `READ` row for every file access delivered on the read routing key.

use async_trait::async_trait;
use dataone_events::{EventKind, Message};
use tracing::{debug, instrument};

use crate::db::{DbError, EventLogRow, EventLogStore};

use super::EventHandler;

/// Handler for file-access (read) events.
#[derive(Debug, Clone)]
pub struct ReadEventHandler {
    node_id: String,
}

impl ReadEventHandler {
    /// Create a handler that stamps rows with `node_id`.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }
}

#[async_trait]
impl<S: EventLogStore> EventHandler<S> for ReadEventHandler {
    fn kind(&self) -> EventKind {
        EventKind::Read
    }

    #[instrument(skip(self, store, tx, msg), fields(entity = %msg.entity))]
    async fn record(&self, store: &S, tx: &mut S::Tx, msg: &Message) -> Result<(), DbError> {
        let row = EventLogRow::from_message(msg, EventKind::Read, &self.node_id);
        debug!(path = %row.path, occurred_at = %row.occurred_at, "Recording read event");
        store.insert_event(tx, &row).await
    }
}
