// Agent message passing
//
// Topic-based publish/subscribe between agents and the executor. Callbacks run
// synchronously on the publishing task.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

pub type Subscriber = Arc<dyn Fn(&BusMessage) -> Result<(), String> + Send + Sync>;

#[derive(Default)]
pub struct MessageBus {
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
    history: Mutex<Vec<BusMessage>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: impl Into<String>, callback: Subscriber) {
        let topic = topic.into();
        self.subscribers.write().entry(topic.clone()).or_default().push(callback);
        tracing::debug!(topic = %topic, subscribers = self.subscriber_count(&topic), "subscriber added");
    }

    /// Record the message and invoke the topic's subscribers in order
    ///
    /// A failing callback is logged and does not stop the others. Returns the
    /// number of callbacks invoked.
    pub fn publish(&self, topic: &str, payload: Value) -> usize {
        let message = BusMessage {
            topic: topic.to_string(),
            timestamp: Utc::now(),
            payload,
        };
        self.history.lock().push(message.clone());

        // Snapshot so callbacks may publish or subscribe themselves
        let callbacks = self
            .subscribers
            .read()
            .get(topic)
            .cloned()
            .unwrap_or_default();

        for callback in &callbacks {
            if let Err(e) = callback(&message) {
                tracing::error!(topic, error = %e, "subscriber callback failed");
            }
        }

        callbacks.len()
    }

    pub fn history(&self) -> Vec<BusMessage> {
        self.history.lock().clone()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.read().get(topic).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn publish_without_subscribers_still_records() {
        let bus = MessageBus::new();

        assert_eq!(bus.publish("nobody", json!({ "x": 1 })), 0);

        let history = bus.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].topic, "nobody");
        assert_eq!(history[0].payload["x"], 1);
    }

    #[test]
    fn subscribers_run_in_order_and_failures_are_isolated() {
        let bus = MessageBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        bus.subscribe(
            "task",
            Arc::new(move |m: &BusMessage| {
                first.lock().push(format!("first:{}", m.payload["id"]));
                Ok(())
            }),
        );
        bus.subscribe("task", Arc::new(|_: &BusMessage| Err("broken".to_string())));
        let third = seen.clone();
        bus.subscribe(
            "task",
            Arc::new(move |_: &BusMessage| {
                third.lock().push("third".to_string());
                Ok(())
            }),
        );

        let invoked = bus.publish("task", json!({ "id": 7 }));

        assert_eq!(invoked, 3);
        assert_eq!(*seen.lock(), vec!["first:7".to_string(), "third".to_string()]);
        assert_eq!(bus.subscriber_count("task"), 3);
        assert_eq!(bus.subscriber_count("other"), 0);
    }

    #[test]
    fn callbacks_may_publish() {
        let bus = Arc::new(MessageBus::new());
        let inner = bus.clone();
        bus.subscribe(
            "outer",
            Arc::new(move |_: &BusMessage| {
                inner.publish("inner", Value::Null);
                Ok(())
            }),
        );

        bus.publish("outer", Value::Null);

        let topics: Vec<String> = bus.history().into_iter().map(|m| m.topic).collect();
        assert_eq!(topics, vec!["outer", "inner"]);
    }
}
