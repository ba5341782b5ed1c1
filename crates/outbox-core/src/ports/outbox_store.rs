//! OutboxStore port - 永続化された outbox テーブル
//!
//! ストアが持つ操作は 3 つ: enqueue（呼び出し側のトランザクション内）、
//! fetch-batch、mark-delivered。outbox レコードを書く経路はこれだけ。
//!
//! # 実装
//! - `impls::InMemoryOutboxStore`（開発・テスト）
//! - `outbox-pg::PostgresOutboxStore`（本番）

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ErrorKind, Message, OutboxCounts, OutboxId, OutboxMessage};

/// StoreError is returned by every store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database could not be reached (pool exhausted, connection lost).
    #[error("outbox store unavailable: {0}")]
    Connection(String),

    /// A statement failed (constraint violation, bad SQL, serialization).
    #[error("outbox query failed: {0}")]
    Query(String),

    /// A persisted record violates the model (e.g. unknown status text).
    #[error("outbox invariant violated: {0}")]
    InvariantViolation(String),

    /// Failure injected by a test double.
    #[error("injected failure: {0}")]
    Injected(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvariantViolation(_) => ErrorKind::Invariant,
            StoreError::Connection(_) | StoreError::Query(_) | StoreError::Injected(_) => {
                ErrorKind::Transient
            }
        }
    }
}

/// OutboxStore persists outbox records.
///
/// # Contract
/// - `enqueue` writes through the caller's transaction `Tx`; nothing is
///   visible to `fetch_batch` until `commit`. Dropping `Tx` without
///   committing rolls it back.
/// - `fetch_batch(limit)` returns at most `limit` Undelivered records ordered
///   by `(created_at, id)`; an empty vec when nothing is pending. Read-only.
/// - `mark_delivered(ids)` is one atomic update. Ids already Delivered are
///   left alone; on error no id changes.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Caller-owned transaction shared with the business write.
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    /// Insert a new Undelivered record inside `tx`. Assigns `id` and `created_at`.
    async fn enqueue(&self, tx: &mut Self::Tx, message: &Message) -> Result<OutboxId, StoreError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;

    async fn fetch_batch(&self, limit: usize) -> Result<Vec<OutboxMessage>, StoreError>;

    async fn mark_delivered(&self, ids: &[OutboxId]) -> Result<(), StoreError>;

    async fn counts(&self) -> Result<OutboxCounts, StoreError>;
}

#[async_trait]
impl<S: OutboxStore> OutboxStore for Arc<S> {
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin().await
    }

    async fn enqueue(&self, tx: &mut Self::Tx, message: &Message) -> Result<OutboxId, StoreError> {
        (**self).enqueue(tx, message).await
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError> {
        (**self).commit(tx).await
    }

    async fn fetch_batch(&self, limit: usize) -> Result<Vec<OutboxMessage>, StoreError> {
        (**self).fetch_batch(limit).await
    }

    async fn mark_delivered(&self, ids: &[OutboxId]) -> Result<(), StoreError> {
        (**self).mark_delivered(ids).await
    }

    async fn counts(&self) -> Result<OutboxCounts, StoreError> {
        (**self).counts().await
    }
}
