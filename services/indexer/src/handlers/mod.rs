//! Event handlers and the routing-key registry.
//!
//! Each DataONE event kind that the indexer records has a handler. The
//! registry maps AMQP routing keys to handlers; it is built once from
//! configuration and never changes afterwards.
//!
//! A routing key without a handler is not an error. The queue may be bound to
//! more keys than the indexer acts on, and such deliveries are simply ignored.

mod read;

pub use read::ReadEventHandler;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use dataone_events::{EventKind, Message};
use tracing::{debug, warn};

use crate::db::{DbError, EventLogStore};

/// Trait for event handlers.
///
/// A handler writes the rows for one message within a transaction owned by
/// the caller. The caller commits or rolls back.
#[async_trait]
pub trait EventHandler<S: EventLogStore>: Send + Sync {
    /// The event kind this handler records.
    fn kind(&self) -> EventKind;

    /// Record a single message.
    async fn record(&self, store: &S, tx: &mut S::Tx, msg: &Message) -> Result<(), DbError>;
}

/// Mapping from DataONE event kind to AMQP routing key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyNames {
    keys: BTreeMap<EventKind, String>,
}

impl KeyNames {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `kind` to `routing_key`.
    pub fn with(mut self, kind: EventKind, routing_key: impl Into<String>) -> Self {
        self.keys.insert(kind, routing_key.into());
        self
    }

    /// Build the mapping from the `amqp-routing-keys` configuration table,
    /// keyed by event kind configuration name (`read`, `create`, ...).
    ///
    /// Entries whose name is not a known event kind are skipped with a warning.
    pub fn from_config(entries: &HashMap<String, String>) -> Self {
        let mut keys = BTreeMap::new();
        for (name, routing_key) in entries {
            match EventKind::from_config_name(name) {
                Some(kind) => {
                    keys.insert(kind, routing_key.clone());
                }
                None => {
                    warn!(name = %name, routing_key = %routing_key, "Unknown event kind in routing key configuration");
                }
            }
        }
        Self { keys }
    }

    /// The routing key configured for `kind`.
    pub fn get(&self, kind: EventKind) -> Option<&str> {
        self.keys.get(&kind).map(String::as_str)
    }
}

/// Construct the handler for an event kind, if the indexer records that kind.
fn handler_for_kind<S: EventLogStore>(
    kind: EventKind,
    node_id: &str,
) -> Option<Box<dyn EventHandler<S>>> {
    match kind {
        EventKind::Read => Some(Box::new(ReadEventHandler::new(node_id))),
        EventKind::Create
        | EventKind::Delete
        | EventKind::Replicate
        | EventKind::ReplicationFailed
        | EventKind::SynchronizationFailed
        | EventKind::Update => None,
    }
}

/// Registry of handlers keyed by routing key.
pub struct HandlerRegistry<S: EventLogStore> {
    handlers: HashMap<String, Box<dyn EventHandler<S>>>,
}

impl<S: EventLogStore> HandlerRegistry<S> {
    /// Create a registry with no handlers.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Build the registry for the configured routing keys.
    ///
    /// `node_id` is stamped on every row the handlers write.
    pub fn build(key_names: &KeyNames, node_id: &str) -> Self {
        let mut registry = Self::empty();

        for kind in EventKind::ALL {
            let Some(routing_key) = key_names.get(kind) else {
                continue;
            };

            match handler_for_kind::<S>(kind, node_id) {
                Some(handler) => registry.register(routing_key, handler),
                None => {
                    debug!(event = %kind, routing_key = %routing_key, "No handler for event kind");
                }
            }
        }

        registry
    }

    /// Register `handler` for `routing_key`, replacing any existing handler.
    pub fn register(&mut self, routing_key: impl Into<String>, handler: Box<dyn EventHandler<S>>) {
        let routing_key = routing_key.into();
        if let Some(previous) = self.handlers.get(&routing_key) {
            warn!(
                routing_key = %routing_key,
                replaced = %previous.kind(),
                with = %handler.kind(),
                "Routing key mapped to more than one event kind"
            );
        }
        self.handlers.insert(routing_key, handler);
    }

    /// Get the handler for a routing key.
    pub fn handler_for(&self, routing_key: &str) -> Option<&dyn EventHandler<S>> {
        self.handlers.get(routing_key).map(|h| h.as_ref())
    }

    /// Routing keys that have a handler.
    pub fn routing_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
