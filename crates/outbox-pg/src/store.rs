//! PostgresOutboxStore - sqlx による `outbox_messages`
//!
//! # クエリ
//! - enqueue: 呼び出し側のトランザクションで INSERT 1 回
//! - fetch_batch: `WHERE status = 'undelivered' ORDER BY created_at, id LIMIT $1`
//!   （部分インデックスで引く）
//! - mark_delivered: `UPDATE ... WHERE id = ANY($1)` 1 回
//!
//! id（UUID として保存する ULID）と `created_at` はアプリ側で決めるので、
//! in-memory store と同じ `(created_at, id)` 順になる。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outbox_core::domain::{DeliveryStatus, Message, OutboxCounts, OutboxId, OutboxMessage};
use outbox_core::ports::{Clock, IdGenerator, OutboxStore, StoreError, SystemClock, UlidGenerator};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::store_error;
use crate::headers::{self, StoredHeader};

pub type PgTx = Transaction<'static, Postgres>;

/// Open a pool; the first connection is established before returning.
pub async fn connect(dsn: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(dsn)
        .await
        .map_err(store_error)
}

#[derive(FromRow, Debug)]
struct OutboxRow {
    id: Uuid,
    status: String,
    topic: String,
    key: Vec<u8>,
    value: Vec<u8>,
    headers: Json<Vec<StoredHeader>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OutboxRow> for OutboxMessage {
    type Error = StoreError;

    fn try_from(row: OutboxRow) -> Result<Self, StoreError> {
        let status: DeliveryStatus = row.status.parse().map_err(|e| {
            StoreError::InvariantViolation(format!("record {}: {e}", row.id))
        })?;
        Ok(OutboxMessage {
            id: OutboxId::from_uuid(row.id),
            message: Message {
                topic: row.topic,
                key: row.key,
                value: row.value,
                headers: headers::decode(row.headers.0)?,
            },
            status,
            created_at: row.created_at,
        })
    }
}

pub struct PostgresOutboxStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    ids: Box<dyn IdGenerator>,
}

impl PostgresOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            ids: Box::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        self.pool.begin().await.map_err(store_error)
    }

    async fn enqueue(&self, tx: &mut PgTx, message: &Message) -> Result<OutboxId, StoreError> {
        let id = self.ids.generate_outbox_id();
        sqlx::query(
            r#"
            INSERT INTO outbox_messages (id, status, topic, key, value, headers, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id.as_uuid())
        .bind(DeliveryStatus::Undelivered.as_str())
        .bind(&message.topic)
        .bind(&message.key)
        .bind(&message.value)
        .bind(Json(headers::encode(&message.headers)))
        .bind(self.clock.now())
        .execute(&mut **tx)
        .await
        .map_err(store_error)?;
        Ok(id)
    }

    async fn commit(&self, tx: PgTx) -> Result<(), StoreError> {
        tx.commit().await.map_err(store_error)
    }

    async fn fetch_batch(&self, limit: usize) -> Result<Vec<OutboxMessage>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            SELECT id, status, topic, key, value, headers, created_at
            FROM outbox_messages
            WHERE status = 'undelivered'
            ORDER BY created_at, id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.into_iter().map(OutboxMessage::try_from).collect()
    }

    async fn mark_delivered(&self, ids: &[OutboxId]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = ids.iter().map(OutboxId::as_uuid).collect();
        let result = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET status = 'delivered'
            WHERE id = ANY($1) AND status = 'undelivered'
            "#,
        )
        .bind(&ids)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        tracing::debug!(
            requested = ids.len(),
            updated = result.rows_affected(),
            "marked outbox messages delivered"
        );
        Ok(())
    }

    async fn counts(&self) -> Result<OutboxCounts, StoreError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM outbox_messages GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(store_error)?;

        let mut counts = OutboxCounts::default();
        for (status, n) in rows {
            let n = u64::try_from(n).unwrap_or_default();
            match status.parse::<DeliveryStatus>() {
                Ok(DeliveryStatus::Undelivered) => counts.undelivered = n,
                Ok(DeliveryStatus::Delivered) => counts.delivered = n,
                Err(e) => return Err(StoreError::InvariantViolation(e.to_string())),
            }
        }
        Ok(counts)
    }
}
