//! Event publishing.
//!
//! Order and product events go out on NATS as JSON when a server is
//! configured. A failed publish is logged and never fails the action that
//! raised the event.

use async_trait::async_trait;

use crate::domain::events::DomainEvent;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent);
}

#[derive(Debug, Clone)]
pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self { Self { client, prefix: prefix.into() } }

    pub fn subject_for(&self, event: &DomainEvent) -> String { format!("{}.{}", self.prefix, event.subject()) }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) {
        let subject = self.subject_for(event);
        let payload = match serde_json::to_vec(event) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(%subject, error = %e, "could not encode event");
                return;
            }
        };
        if let Err(e) = self.client.publish(subject.clone(), payload.into()).await {
            tracing::warn!(%subject, error = %e, "failed to publish event");
        }
    }
}

/// Used when no message bus is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &DomainEvent) {
        tracing::debug!(subject = event.subject(), "event not published (no message bus)");
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingPublisher {
    pub events: std::sync::Mutex<Vec<DomainEvent>>,
}

#[cfg(test)]
impl RecordingPublisher {
    pub fn subjects(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(DomainEvent::subject).collect()
    }
}

#[cfg(test)]
#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &DomainEvent) { self.events.lock().unwrap().push(event.clone()); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::OrderEvent;
    use crate::domain::value_objects::Money;
    use crate::OrderId;

    #[test]
    fn test_event_payload_is_tagged() {
        let event = DomainEvent::Order(OrderEvent::Placed { order_id: OrderId(3), total: Money::new(10200), summary: "hi".into() });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "placed");
        assert_eq!(json["order_id"], 3);
        assert_eq!(json["total"], 10200);
        assert_eq!(event.subject(), "orders.placed");
    }

    #[tokio::test]
    async fn test_log_publisher_accepts_events() {
        LogPublisher.publish(&DomainEvent::Order(OrderEvent::Confirmed { order_id: OrderId(1) })).await;
    }
}
