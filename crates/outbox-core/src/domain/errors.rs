//! Errors - エラー分類とメッセージの検証

/// ErrorKind classifies failures by how the relay reacts to them.
///
/// - Transient: database or broker connectivity; retried on the next tick
/// - Destination: the broker does not know the topic; batch-level retry at the relay
/// - Invariant: a record in a state the model does not allow; a bug, never retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Destination,
    Invariant,
}

/// Maximum topic length accepted by Kafka.
pub const MAX_TOPIC_LEN: usize = 249;

/// ValidationError rejects a message before it is written to the outbox.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("topic is required")]
    EmptyTopic,

    #[error("topic {topic:?} is not a valid destination: {reason}")]
    InvalidTopic { topic: String, reason: &'static str },

    #[error("header key is required at index {index}")]
    EmptyHeaderKey { index: usize },
}
