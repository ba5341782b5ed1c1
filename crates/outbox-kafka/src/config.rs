use std::time::Duration;

/// Connection settings for `KafkaProducer`.
///
/// `message_timeout` bounds how long librdkafka keeps retrying one record
/// (`message.timeout.ms`). Keep it below the relay cycle timeout so a
/// stuck broker surfaces as a produce error rather than a cycle timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    /// Comma-separated `host:port` list.
    pub brokers: String,
    pub message_timeout: Duration,
    pub client_id: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            message_timeout: Duration::from_secs(5),
            client_id: "outbox-relay".to_string(),
        }
    }
}

impl KafkaConfig {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            ..Self::default()
        }
    }

    pub fn with_message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout = timeout;
        self
    }

    /// Broker list with blanks and empty entries removed.
    pub fn broker_list(&self) -> Vec<&str> {
        self.brokers
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .collect()
    }
}
