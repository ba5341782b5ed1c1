//! Producer port - バッチをメッセージブローカーへ publish する
//!
//! relay worker はこの trait にだけ依存するので、トピックでルーティングする
//! ブローカーなら relay のロジックを変えずに差し替えられる。
//!
//! # 実装
//! - `impls::RecordingProducer`, `impls::LogProducer`
//! - `outbox-kafka::KafkaProducer`

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ErrorKind, Message};

/// ProduceError means the batch was not confirmed by the broker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProduceError {
    #[error("unknown topic {topic:?}")]
    UnknownTopic { topic: String },

    #[error("broker rejected batch: {0}")]
    Rejected(String),

    #[error("broker transport failure: {0}")]
    Transport(String),
}

impl ProduceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProduceError::UnknownTopic { .. } => ErrorKind::Destination,
            ProduceError::Rejected(_) | ProduceError::Transport(_) => ErrorKind::Transient,
        }
    }
}

/// Producer publishes an ordered batch as one operation.
///
/// Any `Err` means none of the batch may be treated as delivered, even if
/// the broker accepted part of it. Cancellation is by dropping the future.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn produce(&self, messages: &[Message]) -> Result<(), ProduceError>;
}

#[async_trait]
impl<P: Producer + ?Sized> Producer for Arc<P> {
    async fn produce(&self, messages: &[Message]) -> Result<(), ProduceError> {
        (**self).produce(messages).await
    }
}

#[async_trait]
impl<P: Producer + ?Sized> Producer for Box<P> {
    async fn produce(&self, messages: &[Message]) -> Result<(), ProduceError> {
        (**self).produce(messages).await
    }
}
