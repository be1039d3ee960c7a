//! Event recorder.
//!
//! The recorder is the single entry point for persisting a decoded message. It
//! looks up the handler for the delivery's routing key and runs it inside a
//! fresh transaction:
//!
//! 1. No handler for the key: nothing is written and the call succeeds
//! 2. Handler fails: the transaction is rolled back and the error returned
//! 3. Handler succeeds: the transaction is committed
//!
//! The recorder never retries. Callers decide what a failure means.

use async_trait::async_trait;
use dataone_events::Message;
use tracing::{debug, warn};

use crate::db::{DbError, EventLogStore};
use crate::handlers::HandlerRegistry;

/// Records DataONE events.
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Record `msg` if there is a handler for `routing_key`.
    async fn record_event(&self, routing_key: &str, msg: &Message) -> Result<(), DbError>;
}

/// Recorder that writes to an [`EventLogStore`].
pub struct EventRecorder<S: EventLogStore> {
    store: S,
    registry: HandlerRegistry<S>,
}

impl<S: EventLogStore> EventRecorder<S> {
    /// Create a recorder over `store` using the handlers in `registry`.
    pub fn new(store: S, registry: HandlerRegistry<S>) -> Self {
        Self { store, registry }
    }
}

#[async_trait]
impl<S: EventLogStore> Recorder for EventRecorder<S> {
    async fn record_event(&self, routing_key: &str, msg: &Message) -> Result<(), DbError> {
        let Some(handler) = self.registry.handler_for(routing_key) else {
            debug!(routing_key = %routing_key, "No handler registered for routing key");
            return Ok(());
        };

        let mut tx = self.store.begin().await?;

        if let Err(e) = handler.record(&self.store, &mut tx, msg).await {
            if let Err(rollback_err) = self.store.rollback(tx).await {
                warn!(error = %rollback_err, "Failed to roll back event transaction");
            }
            return Err(e);
        }

        self.store.commit(tx).await
    }
}
