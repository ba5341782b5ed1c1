//! outbox-kafka
//!
//! rdkafka の `FutureProducer` による `Producer` port の Kafka 実装。

mod config;
mod producer;

pub use self::config::KafkaConfig;
pub use self::producer::{KafkaProducer, KafkaSetupError, classify};
