use chrono::{DateTime, Utc};

/// A message received from the broker, handed to the handler by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    topic: String,
    payload: Vec<u8>,
    message_id: String,
    timestamp: i64,
    received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        message_id: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            message_id: message_id.into(),
            timestamp,
            received_at: Utc::now(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The payload as UTF-8, if it is valid UTF-8.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Broker timestamp in milliseconds since the UNIX epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}
