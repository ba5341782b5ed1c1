//! Message - ブローカーに渡す、ワイヤ形式に依存しない単位

use serde::{Deserialize, Serialize};

use super::errors::{MAX_TOPIC_LEN, ValidationError};

/// One message header.
///
/// Headers are kept as an ordered list, not a map: duplicate keys and
/// their positions are part of the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub key: String,
    pub value: Vec<u8>,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Message to publish: destination topic, opaque key/value, ordered headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub headers: Vec<Header>,
}

impl Message {
    pub fn new(
        topic: impl Into<String>,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            value: value.into(),
            headers: Vec::new(),
        }
    }

    /// Append a header (keeps any existing header with the same key).
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push(Header::new(key, value));
        self
    }

    /// First header value for `key`.
    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|h| h.key == key)
            .map(|h| h.value.as_slice())
    }

    /// Every header value for `key`, in order.
    pub fn header_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.headers
            .iter()
            .filter(move |h| h.key == key)
            .map(|h| h.value.as_slice())
    }

    /// Reject messages that can never be delivered.
    ///
    /// Topic rules follow Kafka: 1..=249 chars of `[a-zA-Z0-9._-]`, not "." or "..".
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_topic(&self.topic)?;
        for (index, header) in self.headers.iter().enumerate() {
            if header.key.is_empty() {
                return Err(ValidationError::EmptyHeaderKey { index });
            }
        }
        Ok(())
    }
}

fn validate_topic(topic: &str) -> Result<(), ValidationError> {
    let invalid = |reason| ValidationError::InvalidTopic {
        topic: topic.to_string(),
        reason,
    };

    if topic.is_empty() {
        return Err(ValidationError::EmptyTopic);
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(invalid("longer than 249 characters"));
    }
    if topic == "." || topic == ".." {
        return Err(invalid("reserved name"));
    }
    if !topic
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("allowed characters are [a-zA-Z0-9._-]"));
    }
    Ok(())
}
