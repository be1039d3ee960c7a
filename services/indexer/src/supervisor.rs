//! Connection supervisor - maintains the subscription to the broker.
//!
//! The supervisor:
//! - Establishes the subscription, retrying on the [`RetrySchedule`]
//! - Feeds deliveries and connection-loss notices into one event channel
//! - Re-establishes the subscription when asked to by the dispatch loop
//!
//! Two producers feed the event channel for each session: a forwarder task
//! that drains the consumer stream, and the connection's error callback. The
//! dispatch loop is the only consumer, so reconnection and message handling
//! never run concurrently.

use std::fmt::Display;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use lapin::message::Delivery;
use lapin::{Channel, Connection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use crate::broker::{
    close_connection, subscribe, AmqpSettings, BrokerError, ConsumerEvent, InboundDelivery,
    RetrySchedule, Subscription,
};

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session.
    Disconnected,
    /// Subscribed and consuming.
    Connected,
    /// Tearing down a lost session and establishing a new one.
    Reconnecting,
}

/// A source of deliveries that can be re-established after a loss.
#[async_trait]
pub trait Resubscribe: Send {
    /// Delivery type produced by this source.
    type Delivery: InboundDelivery;

    /// Generation of the live session. Bumped on every successful subscribe.
    fn generation(&self) -> u64;

    /// Tear down the current session and subscribe again.
    async fn reconnect(&mut self) -> Result<(), BrokerError>;
}

/// A live session.
struct Session {
    connection: Connection,
    // Held so the channel stays open for the lifetime of the session.
    _channel: Channel,
    forwarder: JoinHandle<()>,
}

/// Owns the broker connection and keeps the subscription alive.
pub struct ConnectionSupervisor {
    settings: AmqpSettings,
    schedule: RetrySchedule,
    events: mpsc::UnboundedSender<ConsumerEvent<Delivery>>,
    state: ConnectionState,
    generation: u64,
    session: Option<Session>,
}

impl ConnectionSupervisor {
    /// Create a supervisor and the receiving end of its event channel.
    pub fn new(
        settings: AmqpSettings,
        schedule: RetrySchedule,
    ) -> (Self, mpsc::UnboundedReceiver<ConsumerEvent<Delivery>>) {
        let (events, rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            settings,
            schedule,
            events,
            state: ConnectionState::Disconnected,
            generation: 0,
            session: None,
        };
        (supervisor, rx)
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Subscribe to the queue, retrying on the schedule.
    ///
    /// Returns [`BrokerError::RetriesExhausted`] once every attempt has failed.
    pub async fn connect(&mut self) -> Result<(), BrokerError> {
        info!(
            exchange = %self.settings.exchange,
            queue = %self.settings.queue,
            routing_keys = ?self.settings.routing_keys,
            "Connecting to AMQP broker"
        );

        let settings = &self.settings;
        let subscription = self
            .schedule
            .retry("subscribe to AMQP queue", || subscribe(settings))
            .await
            .map_err(|e| BrokerError::RetriesExhausted {
                attempts: self.schedule.max_attempts(),
                last_error: Box::new(e),
            })?;

        self.generation += 1;
        self.start_session(subscription);
        self.state = ConnectionState::Connected;

        info!(generation = self.generation, "Subscribed to AMQP queue");
        Ok(())
    }

    /// Close the current session, if any.
    pub async fn shutdown(&mut self) {
        self.teardown().await;
        self.state = ConnectionState::Disconnected;
    }

    fn start_session(&mut self, subscription: Subscription) {
        let Subscription {
            connection,
            channel,
            consumer,
        } = subscription;
        let generation = self.generation;

        let lost_tx = self.events.clone();
        connection.on_error(move |err| {
            let _ = lost_tx.send(ConsumerEvent::ConnectionLost {
                generation,
                reason: err.to_string(),
            });
        });

        let forwarder = tokio::spawn(
            forward_deliveries(consumer, generation, self.events.clone()).in_current_span(),
        );

        self.session = Some(Session {
            connection,
            _channel: channel,
            forwarder,
        });
    }

    async fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            session.forwarder.abort();
            close_connection(&session.connection).await;
        }
    }
}

#[async_trait]
impl Resubscribe for ConnectionSupervisor {
    type Delivery = Delivery;

    fn generation(&self) -> u64 {
        self.generation
    }

    async fn reconnect(&mut self) -> Result<(), BrokerError> {
        self.state = ConnectionState::Reconnecting;
        self.teardown().await;

        if let Err(e) = self.connect().await {
            self.state = ConnectionState::Disconnected;
            return Err(e);
        }
        Ok(())
    }
}

/// Pump deliveries from `consumer` into `events` until the stream ends.
///
/// A stream error or the end of the stream is reported as a connection loss.
async fn forward_deliveries<S, D, E>(
    mut consumer: S,
    generation: u64,
    events: mpsc::UnboundedSender<ConsumerEvent<D>>,
) where
    S: Stream<Item = Result<D, E>> + Unpin,
    E: Display,
{
    while let Some(item) = consumer.next().await {
        let delivery = match item {
            Ok(delivery) => delivery,
            Err(e) => {
                warn!(generation, error = %e, "AMQP consumer failed");
                let _ = events.send(ConsumerEvent::ConnectionLost {
                    generation,
                    reason: e.to_string(),
                });
                return;
            }
        };

        if events
            .send(ConsumerEvent::Delivery {
                generation,
                delivery,
            })
            .is_err()
        {
            debug!(generation, "Event channel closed, stopping delivery forwarder");
            return;
        }
    }

    let _ = events.send(ConsumerEvent::ConnectionLost {
        generation,
        reason: "consumer stream ended".to_string(),
    });
}
