//! Real-time fan-out.
//!
//! Events are published to topics after the persistence write succeeds.
//! Delivery is best-effort and at-most-once: local subscribers receive via
//! per-topic broadcast channels, other instances via Redis PUBLISH when
//! Redis is configured. Publish failures are logged and never surfaced.

use std::sync::Arc;

use dashmap::DashMap;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

const BROADCAST_CAPACITY: usize = 256;
const REDIS_TOPIC_PREFIX: &str = "agora:rt:";

/// One event on a topic, as delivered to transport consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicEvent {
    pub topic: String,
    pub event: String,
    pub payload: Value,
}

/// Deterministic private-chat topic for a pair of users.
pub fn chat_topic(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}_{b}")
    } else {
        format!("{b}_{a}")
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    topics: Arc<DashMap<String, broadcast::Sender<TopicEvent>>>,
    redis: Option<redis::aio::ConnectionManager>,
}

impl EventBus {
    pub fn new(redis: Option<redis::aio::ConnectionManager>) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            redis,
        }
    }

    /// Fire-and-forget publish. Local fan-out always runs; Redis fan-out
    /// runs when configured. Errors are logged, never returned.
    pub async fn publish(&self, topic: &str, event: &str, payload: Value) {
        let msg = TopicEvent {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
        };

        if let Some(tx) = self.topics.get(topic) {
            // Fails only when no subscriber is listening.
            let _ = tx.send(msg.clone());
        }

        if let Some(redis) = &self.redis {
            let channel = format!("{REDIS_TOPIC_PREFIX}{topic}");
            match serde_json::to_string(&msg) {
                Ok(payload) => {
                    let mut conn = redis.clone();
                    let result: Result<(), redis::RedisError> = redis::cmd("PUBLISH")
                        .arg(&channel)
                        .arg(&payload)
                        .query_async(&mut conn)
                        .await;
                    if let Err(e) = result {
                        tracing::warn!("Redis publish to {} failed: {}", channel, e);
                    }
                }
                Err(e) => tracing::warn!("Failed to encode event for {}: {}", channel, e),
            }
        }
    }

    /// Local subscription to a topic. Transport layers (and tests) consume
    /// events through the returned receiver.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<TopicEvent> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0)
            .subscribe()
    }

    /// Drop topics nobody is listening to.
    pub fn prune(&self) {
        self.topics.retain(|_, tx| tx.receiver_count() > 0);
    }
}

/// Start the Redis subscriber background task. Pattern-subscribes to every
/// topic and forwards into the local broadcast map, so events published by
/// other instances reach local subscribers. No-op without Redis.
pub fn start_subscriber(bus: EventBus, redis_url: String) {
    if bus.redis.is_none() {
        tracing::info!("Redis not configured — cross-instance fan-out disabled");
        return;
    }

    tokio::spawn(async move {
        // Pub/sub needs a dedicated connection, not the ConnectionManager.
        let client = match redis::Client::open(redis_url.as_str()) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Failed to create Redis pub/sub client: {}", e);
                return;
            }
        };

        loop {
            match client.get_async_pubsub().await {
                Ok(mut pubsub) => {
                    if let Err(e) = pubsub.psubscribe(format!("{REDIS_TOPIC_PREFIX}*")).await {
                        tracing::error!("Redis psubscribe failed: {}", e);
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                    tracing::info!("Redis pub/sub subscriber connected");

                    let mut stream = pubsub.on_message();
                    while let Some(msg) = stream.next().await {
                        let payload: String = match msg.get_payload() {
                            Ok(p) => p,
                            Err(_) => continue,
                        };
                        let event: TopicEvent = match serde_json::from_str(&payload) {
                            Ok(e) => e,
                            Err(_) => continue,
                        };
                        if let Some(tx) = bus.topics.get(&event.topic) {
                            let _ = tx.send(event);
                        }
                    }
                    tracing::warn!("Redis pub/sub stream ended, reconnecting...");
                }
                Err(e) => {
                    tracing::error!("Failed to connect Redis pub/sub: {}, retrying in 5s", e);
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_topic_is_order_independent() {
        assert_eq!(chat_topic("alice", "bob"), "alice_bob");
        assert_eq!(chat_topic("bob", "alice"), "alice_bob");
        assert_eq!(chat_topic("x", "x"), "x_x");
    }

    #[tokio::test]
    async fn local_subscribers_receive_published_events() {
        let bus = EventBus::new(None);
        let mut rx = bus.subscribe("g1");

        bus.publish("g1", "new_message", json!({"id": "m1"})).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "new_message");
        assert_eq!(event.payload["id"], "m1");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new(None);
        bus.publish("nowhere", "new_message", json!({})).await;
    }
}
