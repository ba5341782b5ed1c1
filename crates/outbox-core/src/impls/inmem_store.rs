//! InMemoryOutboxStore - 開発・テスト用の outbox
//!
//! PostgreSQL 実装と同じ不変条件を守る:
//! - レコードは id をキーに保持し、挿入は `commit` 経由のみ
//! - status の変更は `mark_delivered` 経由のみ
//! - トランザクションは全体が適用されるか、何も適用されないか
//!
//! 同じトランザクションで書かれた business row はテーブルごとに JSON のまま
//! 保持する（二重書き込みのアトミック性をテストで確認するため）

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{DeliveryStatus, Message, OutboxCounts, OutboxId, OutboxMessage};
use crate::ports::{Clock, IdGenerator, OutboxStore, StoreError, SystemClock, UlidGenerator};

/// Remaining injected failures per operation.
#[derive(Debug, Default)]
struct Faults {
    fetch: u32,
    mark_delivered: u32,
    commit: u32,
}

impl Faults {
    fn take(counter: &mut u32, op: &str) -> Result<(), StoreError> {
        if *counter > 0 {
            *counter -= 1;
            return Err(StoreError::Injected(format!("{op} failed")));
        }
        Ok(())
    }
}

#[derive(Default)]
struct State {
    /// All records (source of truth).
    records: HashMap<OutboxId, OutboxMessage>,

    /// Undelivered records in fetch order.
    pending: BTreeSet<(DateTime<Utc>, OutboxId)>,

    /// Committed business rows by table.
    business: HashMap<String, Vec<serde_json::Value>>,

    faults: Faults,
}

/// Transaction for `InMemoryOutboxStore`.
///
/// Writes are staged here and applied by `commit`. Dropping it discards
/// everything (rollback).
#[derive(Debug, Default)]
pub struct InMemoryTx {
    staged: Vec<OutboxMessage>,
    business: Vec<(String, serde_json::Value)>,
}

impl InMemoryTx {
    /// Stage a business row for `table`.
    pub fn insert_business_row(&mut self, table: impl Into<String>, row: serde_json::Value) {
        self.business.push((table.into(), row));
    }

    /// Number of staged outbox records.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }
}

/// In-memory outbox store.
pub struct InMemoryOutboxStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    ids: Box<dyn IdGenerator>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Use `clock` for `created_at` and for the ULID timestamp.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            ids: Box::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
        }
    }

    /// Fail the next `n` calls to `fetch_batch`.
    pub async fn fail_next_fetch(&self, n: u32) {
        self.state.lock().await.faults.fetch = n;
    }

    /// Fail the next `n` calls to `mark_delivered` (no id changes).
    pub async fn fail_next_mark_delivered(&self, n: u32) {
        self.state.lock().await.faults.mark_delivered = n;
    }

    /// Fail the next `n` calls to `commit` (the transaction is discarded).
    pub async fn fail_next_commit(&self, n: u32) {
        self.state.lock().await.faults.commit = n;
    }

    pub async fn get(&self, id: OutboxId) -> Option<OutboxMessage> {
        self.state.lock().await.records.get(&id).cloned()
    }

    /// Every record in `(created_at, id)` order, whatever its status.
    pub async fn snapshot(&self) -> Vec<OutboxMessage> {
        let state = self.state.lock().await;
        let mut records: Vec<OutboxMessage> = state.records.values().cloned().collect();
        records.sort_by_key(OutboxMessage::ordering_key);
        records
    }

    /// Committed business rows for `table`.
    pub async fn business_rows(&self, table: &str) -> Vec<serde_json::Value> {
        self.state
            .lock()
            .await
            .business
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for InMemoryOutboxStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx, StoreError> {
        Ok(InMemoryTx::default())
    }

    async fn enqueue(&self, tx: &mut InMemoryTx, message: &Message) -> Result<OutboxId, StoreError> {
        let id = self.ids.generate_outbox_id();
        let record = OutboxMessage::new(id, message.clone(), self.clock.now());
        tx.staged.push(record);
        Ok(id)
    }

    async fn commit(&self, tx: InMemoryTx) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        Faults::take(&mut state.faults.commit, "commit")?;

        // validate everything before touching state
        for record in &tx.staged {
            if state.records.contains_key(&record.id) {
                return Err(StoreError::Query(format!("duplicate outbox id {}", record.id)));
            }
        }

        for record in tx.staged {
            state.pending.insert(record.ordering_key());
            state.records.insert(record.id, record);
        }
        for (table, row) in tx.business {
            state.business.entry(table).or_default().push(row);
        }
        Ok(())
    }

    async fn fetch_batch(&self, limit: usize) -> Result<Vec<OutboxMessage>, StoreError> {
        let mut state = self.state.lock().await;
        Faults::take(&mut state.faults.fetch, "fetch_batch")?;
        let state = &*state;

        state
            .pending
            .iter()
            .take(limit)
            .map(|(_, id)| {
                state.records.get(id).cloned().ok_or_else(|| {
                    StoreError::InvariantViolation(format!("pending index references missing record {id}"))
                })
            })
            .collect()
    }

    async fn mark_delivered(&self, ids: &[OutboxId]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        Faults::take(&mut state.faults.mark_delivered, "mark_delivered")?;
        let state = &mut *state;

        // Unknown ids are skipped, the same as `UPDATE ... WHERE id = ANY($1)`.
        for id in ids {
            let Some(record) = state.records.get_mut(id) else {
                continue;
            };
            let key = record.ordering_key();
            if record.mark_delivered() {
                state.pending.remove(&key);
            }
        }
        Ok(())
    }

    async fn counts(&self) -> Result<OutboxCounts, StoreError> {
        let state = self.state.lock().await;
        let mut counts = OutboxCounts::default();
        for record in state.records.values() {
            match record.status {
                DeliveryStatus::Undelivered => counts.undelivered += 1,
                DeliveryStatus::Delivered => counts.delivered += 1,
            }
        }
        Ok(counts)
    }
}
