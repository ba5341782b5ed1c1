//! Enqueuer - アトミックな二重書き込み（business write + outbox insert）
//!
//! # フロー
//! 1. 全メッセージを validate（不正なリクエストではトランザクションを開かない）
//! 2. ストアのトランザクションを `begin`
//! 3. 呼び出し側の business write を同じトランザクションで適用
//! 4. 各メッセージを `enqueue`
//! 5. `commit`
//!
//! どこで失敗しても早期 return でトランザクションを drop し、両方の書き込みを
//! ロールバックする。この層ではリトライしない（どう返すかは呼び出し側が決める）

use async_trait::async_trait;

use crate::domain::{ErrorKind, Message, OutboxId, ValidationError};
use crate::ports::{OutboxStore, StoreError};

pub type BusinessError = Box<dyn std::error::Error + Send + Sync>;

/// Business mutation committed together with the outbox records.
///
/// Implemented per store transaction type, e.g. an SQL insert for
/// `sqlx::Transaction` or a staged row for the in-memory store.
#[async_trait]
pub trait BusinessWrite<Tx: Send>: Send + Sync {
    async fn apply(&self, tx: &mut Tx, messages: &[Message]) -> Result<(), BusinessError>;
}

/// Enqueue messages without any business write.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBusinessWrite;

#[async_trait]
impl<Tx: Send> BusinessWrite<Tx> for NoBusinessWrite {
    async fn apply(&self, _tx: &mut Tx, _messages: &[Message]) -> Result<(), BusinessError> {
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("message {index} rejected: {source}")]
    InvalidMessage {
        index: usize,
        source: ValidationError,
    },

    #[error("could not begin transaction: {0}")]
    Begin(#[source] StoreError),

    #[error("business write failed: {0}")]
    Business(#[source] BusinessError),

    #[error("outbox insert failed: {0}")]
    Enqueue(#[source] StoreError),

    #[error("commit failed: {0}")]
    Commit(#[source] StoreError),
}

impl EnqueueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EnqueueError::InvalidMessage { .. } => ErrorKind::Destination,
            EnqueueError::Business(_) => ErrorKind::Transient,
            EnqueueError::Begin(e) | EnqueueError::Enqueue(e) | EnqueueError::Commit(e) => e.kind(),
        }
    }

    /// The request itself was bad; retrying it cannot succeed.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, EnqueueError::InvalidMessage { .. })
    }
}

pub struct Enqueuer<S> {
    store: S,
}

impl<S: OutboxStore> Enqueuer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Commit `business` and one outbox record per message atomically.
    /// Returns the new ids in message order.
    pub async fn submit<B>(&self, business: &B, messages: &[Message]) -> Result<Vec<OutboxId>, EnqueueError>
    where
        B: BusinessWrite<S::Tx> + ?Sized,
    {
        for (index, message) in messages.iter().enumerate() {
            message
                .validate()
                .map_err(|source| EnqueueError::InvalidMessage { index, source })?;
        }

        let mut tx = self.store.begin().await.map_err(EnqueueError::Begin)?;

        business
            .apply(&mut tx, messages)
            .await
            .map_err(EnqueueError::Business)?;

        let mut ids = Vec::with_capacity(messages.len());
        for message in messages {
            let id = self
                .store
                .enqueue(&mut tx, message)
                .await
                .map_err(EnqueueError::Enqueue)?;
            ids.push(id);
        }

        self.store.commit(tx).await.map_err(EnqueueError::Commit)?;
        tracing::debug!(count = ids.len(), "enqueued outbox messages");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryOutboxStore, InMemoryTx};

    /// Records one row per message; fails when asked to.
    struct RecordInfo {
        fail: bool,
    }

    #[async_trait]
    impl BusinessWrite<InMemoryTx> for RecordInfo {
        async fn apply(&self, tx: &mut InMemoryTx, messages: &[Message]) -> Result<(), BusinessError> {
            if self.fail {
                return Err("constraint violated".into());
            }
            for message in messages {
                tx.insert_business_row(
                    "message_infos",
                    serde_json::json!({ "value_length": message.value.len() }),
                );
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn commits_business_and_outbox_together() {
        let enqueuer = Enqueuer::new(InMemoryOutboxStore::new());
        let ids = enqueuer
            .submit(
                &RecordInfo { fail: false },
                &[Message::new("orders", "k", "abc"), Message::new("orders", "k", "de")],
            )
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
        let store = enqueuer.store();
        assert_eq!(store.business_rows("message_infos").await.len(), 2);
        for id in ids {
            assert!(store.get(id).await.is_some());
        }
    }

    #[tokio::test]
    async fn business_failure_rolls_back() {
        let enqueuer = Enqueuer::new(InMemoryOutboxStore::new());
        let err = enqueuer
            .submit(&RecordInfo { fail: true }, &[Message::new("orders", "k", "v")])
            .await
            .unwrap_err();

        assert!(matches!(err, EnqueueError::Business(_)));
        assert_eq!(enqueuer.store().counts().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn commit_failure_rolls_back() {
        let enqueuer = Enqueuer::new(InMemoryOutboxStore::new());
        enqueuer.store().fail_next_commit(1).await;

        let err = enqueuer
            .submit(&RecordInfo { fail: false }, &[Message::new("orders", "k", "v")])
            .await
            .unwrap_err();

        assert!(matches!(err, EnqueueError::Commit(_)));
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(enqueuer.store().business_rows("message_infos").await.is_empty());
        assert_eq!(enqueuer.store().counts().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn invalid_message_is_rejected_before_any_write() {
        let enqueuer = Enqueuer::new(InMemoryOutboxStore::new());
        let err = enqueuer
            .submit(
                &RecordInfo { fail: false },
                &[Message::new("orders", "k", "v"), Message::new("", "k", "v")],
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EnqueueError::InvalidMessage {
                index: 1,
                source: ValidationError::EmptyTopic
            }
        ));
        assert!(err.is_invalid_request());
        assert!(enqueuer.store().business_rows("message_infos").await.is_empty());
    }

    #[tokio::test]
    async fn works_without_business_write() {
        let enqueuer = Enqueuer::new(InMemoryOutboxStore::new());
        let ids = enqueuer
            .submit(&NoBusinessWrite, &[Message::new("orders", "k", "v")])
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);
    }
}
