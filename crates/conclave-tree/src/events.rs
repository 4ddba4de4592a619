//! Event Bus Facade (spec §4 component I, §6 "Pub/Sub topics"): topic-based fan-out
//! to UI and persistence subscribers. The core does not assume ordering across
//! topics, so this is a flat map of `tokio::sync::broadcast` channels keyed by topic
//! string, grounded on the donor's `ResourceDriver::emit_event` — a single structured
//! event crossing one call surface — generalized from one graph address to many
//! named topics.

use conclave_core::Value;
use dashmap::DashMap;
use tokio::sync::broadcast;

const TOPIC_CAPACITY: usize = 1024;

#[derive(Clone, Debug, serde::Serialize)]
pub struct TopicEvent {
    pub topic: String,
    pub payload: Value,
}

pub struct EventBus {
    topics: DashMap<String, broadcast::Sender<TopicEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { topics: DashMap::new() }
    }

    pub fn publish(&self, topic: &str, payload: Value) {
        let sender = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone();
        // No active subscribers is not an error — the core does not require delivery.
        let _ = sender.send(TopicEvent { topic: topic.to_string(), payload });
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<TopicEvent> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// `conclave_agent::EventPublisher` impl so an Agent Actor's `publish_event` action
/// reaches this bus without depending on it directly.
pub struct EventBusPublisher {
    pub bus: std::sync::Arc<EventBus>,
}

#[async_trait::async_trait]
impl conclave_agent::EventPublisher for EventBusPublisher {
    async fn publish(&self, topic: &str, payload: Value) -> conclave_core::Result<()> {
        self.bus.publish(topic, payload);
        Ok(())
    }
}
