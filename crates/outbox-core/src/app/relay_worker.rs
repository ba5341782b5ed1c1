//! RelayWorker - コミット済み outbox レコードをブローカーへ中継する
//!
//! # サイクル
//! 1. `fetch_batch(batch_size)`。空なら何もせず終了
//! 2. バッチ全体を fetch 順のまま `produce`
//! 3. バッチの全 id を `mark_delivered`
//!
//! 2 か 3 で失敗した場合は何も delivered にしない。同じレコードが次の tick で
//! 再取得される（at-least-once、バッチ単位のリトライ）。`timeout` を超えた
//! サイクルはその時点の await で drop され、結果は同じ。
//!
//! # ループ
//! - サイクルは 1 タスク上で厳密に逐次実行
//! - tick 待ちの間だけ shutdown と競合させる。実行中のサイクルは shutdown では
//!   中断せず、自身の timeout でのみ打ち切られる
//! - サイクルの失敗ではループを抜けない。invariant 違反も含めてログに出して次の
//!   tick へ進む。`run` が返るのは shutdown のときだけ

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::config::{ConfigError, RelayConfig};
use crate::domain::ErrorKind;
use crate::ports::{OutboxStore, ProduceError, Producer, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("fetching outbox batch failed: {0}")]
    Fetch(#[source] StoreError),

    #[error("publishing {count} message(s) failed: {source}")]
    Produce { count: usize, source: ProduceError },

    #[error("acknowledging {count} message(s) failed: {source}")]
    Acknowledge { count: usize, source: StoreError },

    #[error("relay cycle exceeded {0:?}")]
    Timeout(Duration),

    /// The relay task ended without returning (panic or abort).
    #[error("relay task terminated: {0}")]
    Terminated(String),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Fetch(e) | RelayError::Acknowledge { source: e, .. } => e.kind(),
            RelayError::Produce { source, .. } => source.kind(),
            RelayError::Timeout(_) => ErrorKind::Transient,
            RelayError::Terminated(_) => ErrorKind::Invariant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was pending.
    Idle,
    Delivered { count: usize },
}

/// Totals accumulated by `RelayWorker::run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub cycles: u64,
    pub idle_cycles: u64,
    pub delivered: u64,
    /// Cycles that failed at fetch, publish or acknowledge (transient or destination).
    pub failed_cycles: u64,
    pub timed_out_cycles: u64,
    /// Cycles that hit data the model does not allow (bad status, bad header).
    pub invariant_violations: u64,
}

pub struct RelayWorker<S, P> {
    store: S,
    producer: P,
    config: RelayConfig,
}

impl<S, P> RelayWorker<S, P>
where
    S: OutboxStore,
    P: Producer,
{
    pub fn new(store: S, producer: P, config: RelayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            producer,
            config,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// One fetch/publish/acknowledge pass, without a deadline.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, RelayError> {
        let batch = self
            .store
            .fetch_batch(self.config.batch_size)
            .await
            .map_err(RelayError::Fetch)?;
        if batch.is_empty() {
            return Ok(CycleOutcome::Idle);
        }

        let count = batch.len();
        let (ids, messages): (Vec<_>, Vec<_>) =
            batch.into_iter().map(|record| (record.id, record.message)).unzip();

        self.producer
            .produce(&messages)
            .await
            .map_err(|source| RelayError::Produce { count, source })?;

        self.store
            .mark_delivered(&ids)
            .await
            .map_err(|source| RelayError::Acknowledge { count, source })?;

        Ok(CycleOutcome::Delivered { count })
    }

    /// `run_cycle` bounded by `config.timeout`.
    pub async fn run_cycle_with_timeout(&self) -> Result<CycleOutcome, RelayError> {
        tokio::time::timeout(self.config.timeout, self.run_cycle())
            .await
            .map_err(|_| RelayError::Timeout(self.config.timeout))?
    }

    /// Tick loop. Returns once `shutdown` turns true or its sender is
    /// dropped; cycle failures are logged and retried on the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> RelayReport {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut report = RelayReport::default();
        tracing::info!(
            batch_size = self.config.batch_size,
            interval_ms = self.config.interval.as_millis() as u64,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "relay worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            report.cycles += 1;
            match self.run_cycle_with_timeout().await {
                Ok(CycleOutcome::Idle) => {
                    report.idle_cycles += 1;
                    tracing::debug!("no pending outbox messages");
                }
                Ok(CycleOutcome::Delivered { count }) => {
                    report.delivered += count as u64;
                    tracing::info!(count, "delivered outbox batch");
                }
                Err(err @ RelayError::Timeout(_)) => {
                    report.timed_out_cycles += 1;
                    tracing::warn!(error = %err, "relay cycle timed out");
                }
                Err(err) if err.kind() == ErrorKind::Invariant => {
                    // 壊れたレコード。人手での修復待ち、ループは継続
                    report.invariant_violations += 1;
                    tracing::error!(error = %err, kind = "invariant", "relay cycle hit invalid outbox data");
                }
                Err(err) => {
                    report.failed_cycles += 1;
                    tracing::error!(error = %err, kind = ?err.kind(), "relay cycle failed");
                }
            }
        }

        tracing::info!(
            cycles = report.cycles,
            delivered = report.delivered,
            "relay worker stopped"
        );
        report
    }
}
