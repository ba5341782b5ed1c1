//! KafkaProducer - outbox のバッチを Kafka へ publish する
//!
//! # バッチの扱い
//! まずバッチ順に全レコードを librdkafka に渡し、その後で delivery report を
//! 順に待つ。`enable.idempotence=true` なので librdkafka 内部のリトライでも
//! パーティション内の順序は保たれる。report が 1 つでも失敗したらバッチ全体を
//! 失敗とし、届いていたレコードも次のリトライで再送される（at-least-once）。

use std::time::Duration;

use async_trait::async_trait;
use outbox_core::domain::Message;
use outbox_core::ports::{ProduceError, Producer};
use rdkafka::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer as _};
use rdkafka::util::Timeout;

use crate::config::KafkaConfig;

#[derive(Debug, thiserror::Error)]
pub enum KafkaSetupError {
    #[error("no kafka brokers configured")]
    NoBrokers,

    #[error("kafka client: {0}")]
    Client(#[from] KafkaError),
}

/// Map a librdkafka error for a record bound to `topic`.
pub fn classify(err: &KafkaError, topic: &str) -> ProduceError {
    match err.rdkafka_error_code() {
        Some(RDKafkaErrorCode::UnknownTopicOrPartition | RDKafkaErrorCode::UnknownTopic) => {
            ProduceError::UnknownTopic {
                topic: topic.to_string(),
            }
        }
        Some(
            RDKafkaErrorCode::QueueFull
            | RDKafkaErrorCode::MessageTimedOut
            | RDKafkaErrorCode::AllBrokersDown
            | RDKafkaErrorCode::BrokerTransportFailure
            | RDKafkaErrorCode::NetworkException
            | RDKafkaErrorCode::RequestTimedOut,
        ) => ProduceError::Transport(err.to_string()),
        _ => ProduceError::Rejected(err.to_string()),
    }
}

fn headers(message: &Message) -> Option<OwnedHeaders> {
    if message.headers.is_empty() {
        return None;
    }
    let owned = message.headers.iter().fold(
        OwnedHeaders::new_with_capacity(message.headers.len()),
        |acc, h| {
            acc.insert(Header {
                key: &h.key,
                value: Some(h.value.as_slice()),
            })
        },
    );
    Some(owned)
}

pub struct KafkaProducer {
    inner: FutureProducer,
}

impl KafkaProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaSetupError> {
        let brokers = config.broker_list();
        if brokers.is_empty() {
            return Err(KafkaSetupError::NoBrokers);
        }

        let inner: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("client.id", &config.client_id)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set(
                "message.timeout.ms",
                config.message_timeout.as_millis().to_string(),
            )
            .create()?;

        tracing::info!(brokers = %brokers.join(","), "kafka producer created");
        Ok(Self { inner })
    }

    /// Wait for queued records before exit.
    pub fn flush(&self, timeout: Duration) -> Result<(), ProduceError> {
        self.inner
            .flush(Timeout::After(timeout))
            .map_err(|e| ProduceError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Producer for KafkaProducer {
    async fn produce(&self, messages: &[Message]) -> Result<(), ProduceError> {
        let mut pending = Vec::with_capacity(messages.len());
        for message in messages {
            let mut record = FutureRecord::to(&message.topic)
                .key(message.key.as_slice())
                .payload(message.value.as_slice());
            if let Some(headers) = headers(message) {
                record = record.headers(headers);
            }
            let delivery = self
                .inner
                .send_result(record)
                .map_err(|(err, _)| classify(&err, &message.topic))?;
            pending.push((delivery, message.topic.as_str()));
        }

        for (delivery, topic) in pending {
            match delivery.await {
                Ok(Ok(_)) => {}
                Ok(Err((err, _))) => return Err(classify(&err, topic)),
                Err(_canceled) => {
                    return Err(ProduceError::Transport("delivery report dropped".into()));
                }
            }
        }

        tracing::debug!(count = messages.len(), "kafka batch acknowledged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RDKafkaErrorCode::UnknownTopicOrPartition)]
    #[case(RDKafkaErrorCode::UnknownTopic)]
    fn unknown_topic(#[case] code: RDKafkaErrorCode) {
        let err = KafkaError::MessageProduction(code);
        assert_eq!(
            classify(&err, "orders"),
            ProduceError::UnknownTopic {
                topic: "orders".into()
            }
        );
    }

    #[rstest]
    #[case(RDKafkaErrorCode::QueueFull)]
    #[case(RDKafkaErrorCode::MessageTimedOut)]
    #[case(RDKafkaErrorCode::AllBrokersDown)]
    #[case(RDKafkaErrorCode::BrokerTransportFailure)]
    fn transport(#[case] code: RDKafkaErrorCode) {
        let err = KafkaError::MessageProduction(code);
        assert!(matches!(classify(&err, "orders"), ProduceError::Transport(_)));
    }

    #[rstest]
    #[case(RDKafkaErrorCode::MessageSizeTooLarge)]
    #[case(RDKafkaErrorCode::TopicAuthorizationFailed)]
    fn rejected(#[case] code: RDKafkaErrorCode) {
        let err = KafkaError::MessageProduction(code);
        assert!(matches!(classify(&err, "orders"), ProduceError::Rejected(_)));
    }

    #[test]
    fn empty_broker_list_is_rejected() {
        let result = KafkaProducer::new(&KafkaConfig::new(" , "));
        assert!(matches!(result, Err(KafkaSetupError::NoBrokers)));
    }

    #[test]
    fn headers_keep_order_and_duplicates() {
        use rdkafka::message::Headers;

        let message = Message::new("t", "k", "v")
            .with_header("a", "1")
            .with_header("a", "2");
        let owned = headers(&message).unwrap();

        assert_eq!(owned.count(), 2);
        assert_eq!(owned.get(0).value, Some(b"1".as_slice()));
        assert_eq!(owned.get(1).value, Some(b"2".as_slice()));
        assert!(headers(&Message::new("t", "k", "v")).is_none());
    }
}
