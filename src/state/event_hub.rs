use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::dto::sse::ServerEvent;

/// Named JSON events fanned out to every subscriber of one audience.
pub struct EventHub {
    audience: &'static str,
    sender: broadcast::Sender<ServerEvent>,
}

impl EventHub {
    pub fn new(audience: &'static str, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { audience, sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Serialize `payload` under `event` and send it. Returns how many subscribers got it.
    pub fn publish(&self, event: &str, payload: &impl Serialize) -> usize {
        match ServerEvent::json(Some(event.to_string()), payload) {
            Ok(message) => self.send(message),
            Err(err) => {
                warn!(audience = self.audience, event, error = %err, "event payload not serializable");
                0
            }
        }
    }

    /// Plain-text notice.
    pub fn notice(&self, message: &str) -> usize {
        self.send(ServerEvent::new(Some("info".to_string()), message.to_string()))
    }

    fn send(&self, message: ServerEvent) -> usize {
        // No subscriber is not an error: displays come and go.
        self.sender.send(message).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_current_subscribers_only() {
        let hub = EventHub::new("public", 4);
        assert_eq!(hub.publish("session.state", &serde_json::json!({"phase": "setup"})), 0);

        let mut rx = hub.subscribe();
        assert_eq!(hub.publish("session.state", &serde_json::json!({"phase": "armed"})), 1);
        let message = rx.try_recv().unwrap();
        assert_eq!(message.event.as_deref(), Some("session.state"));
        assert_eq!(message.data, r#"{"phase":"armed"}"#);
    }
}
