//! Dispatch loop.
//!
//! The loop is the single control point of the indexer. It reads events from
//! the supervisor's channel one at a time:
//! 1. Connection lost: ask the supervisor to reconnect, then keep reading
//! 2. Delivery: decode, filter to the repository subtree, record, then ack or
//!    reject based on the outcome
//!
//! A delivery is never acknowledged before its recording attempt completes.
//! Malformed messages and recording failures are rejected without requeue so a
//! poison message cannot loop forever.

use dataone_events::Message;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::broker::{BrokerError, ConsumerEvent, InboundDelivery};
use crate::recorder::Recorder;
use crate::supervisor::Resubscribe;

/// How a delivery is settled with the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge: handled, filtered, or ignored.
    Ack,
    /// Negatively acknowledge without requeue: the message cannot be processed.
    Reject,
}

/// Routes deliveries to the recorder.
pub struct Dispatcher<R> {
    recorder: R,
    repository_root: String,
}

impl<R: Recorder> Dispatcher<R> {
    /// Create a dispatcher that records messages under `repository_root`.
    pub fn new(recorder: R, repository_root: impl Into<String>) -> Self {
        Self {
            recorder,
            repository_root: repository_root.into(),
        }
    }

    /// Process one message body and decide how to settle it.
    pub async fn dispatch(&self, routing_key: &str, body: &[u8]) -> Disposition {
        let msg = match Message::decode(body) {
            Ok(msg) => msg,
            Err(e) => {
                error!(
                    routing_key = %routing_key,
                    error = %e,
                    body = %String::from_utf8_lossy(body),
                    "Unable to parse message"
                );
                return Disposition::Reject;
            }
        };

        if !msg.is_under(&self.repository_root) {
            debug!(
                routing_key = %routing_key,
                path = %msg.path,
                "Ignoring message outside the repository"
            );
            return Disposition::Ack;
        }

        match self.recorder.record_event(routing_key, &msg).await {
            Ok(()) => Disposition::Ack,
            Err(e) => {
                error!(
                    routing_key = %routing_key,
                    entity = %msg.entity,
                    path = %msg.path,
                    error = %e,
                    "Unable to record message"
                );
                Disposition::Reject
            }
        }
    }

    /// Process a delivery and settle it with the broker.
    #[instrument(skip(self, delivery), fields(routing_key = %delivery.routing_key(), delivery_tag = delivery.delivery_tag()))]
    pub async fn handle_delivery<D: InboundDelivery>(&self, delivery: &D) -> Disposition {
        let disposition = self
            .dispatch(delivery.routing_key(), delivery.body())
            .await;

        let settled = match disposition {
            Disposition::Ack => delivery.ack().await,
            Disposition::Reject => delivery.reject().await,
        };
        if let Err(e) = settled {
            warn!(error = %e, "Failed to settle delivery");
        }

        disposition
    }

    /// Run until the event channel closes or reconnection fails for good.
    ///
    /// Returns an error only when the supervisor gives up reconnecting; the
    /// caller is expected to terminate the process.
    pub async fn run<C: Resubscribe>(
        &self,
        supervisor: &mut C,
        events: &mut mpsc::UnboundedReceiver<ConsumerEvent<C::Delivery>>,
    ) -> Result<(), BrokerError> {
        let mut processed: u64 = 0;

        while let Some(event) = events.recv().await {
            match event {
                ConsumerEvent::Delivery {
                    generation,
                    delivery,
                } => {
                    if generation != supervisor.generation() {
                        // Unacked deliveries from a dead channel are redelivered by the broker.
                        debug!(
                            generation,
                            current = supervisor.generation(),
                            delivery_tag = delivery.delivery_tag(),
                            "Dropping delivery from a closed session"
                        );
                        continue;
                    }

                    self.handle_delivery(&delivery).await;
                    processed += 1;
                }

                ConsumerEvent::ConnectionLost { generation, reason } => {
                    if generation != supervisor.generation() {
                        debug!(
                            generation,
                            current = supervisor.generation(),
                            "Ignoring loss notice from a closed session"
                        );
                        continue;
                    }

                    error!(reason = %reason, generation, "AMQP connection lost");
                    if let Err(e) = supervisor.reconnect().await {
                        error!(error = %e, "Failed to restore the AMQP connection");
                        return Err(e);
                    }
                    info!(generation = supervisor.generation(), "AMQP connection restored");
                }
            }
        }

        info!(processed, "Event channel closed, dispatch loop stopping");
        Ok(())
    }
}
