use chrono::{DateTime, Utc};
use std::fmt;

/// A publish received from the device broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn from_topic(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        InboundMessage {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let content = String::from_utf8_lossy(&self.payload);
        let preview: String = content.chars().take(64).collect();
        write!(f, "{} {}: {}", self.received_at, self.topic, preview)
    }
}

/// What the transport reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Broker accepted the connection. Subscriptions have to be renewed.
    Connected,
    Disconnected,
    Message(InboundMessage),
}
