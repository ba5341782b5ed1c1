//! RelayHandle - tokio タスク上で RelayWorker を動かす
//!
//! # Shutdown
//! - watch チャネルで停止を通知する。handle を drop しても止まる
//! - 実行中のサイクルは最後まで（または timeout まで）走らせてから終了

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::relay_worker::{RelayError, RelayReport, RelayWorker};
use crate::ports::{OutboxStore, Producer};

/// Running relay worker.
/// - dropping the handle drops `shutdown_tx`, which also stops the worker
/// - `shutdown_and_join()` waits for the in-flight cycle to drain
pub struct RelayHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<RelayReport>,
}

impl RelayHandle {
    pub fn spawn<S, P>(worker: RelayWorker<S, P>) -> Self
    where
        S: OutboxStore + 'static,
        P: Producer + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move { worker.run(shutdown_rx).await });
        Self { shutdown_tx, join }
    }

    /// Stop starting new cycles. A cycle already running is left to finish
    /// or hit its timeout.
    pub fn request_shutdown(&self) {
        // receiver is gone once the loop has returned
        let _ = self.shutdown_tx.send(true);
    }

    /// True once the loop has returned.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn shutdown_and_join(self) -> Result<RelayReport, RelayError> {
        self.request_shutdown();
        self.join
            .await
            .map_err(|e| RelayError::Terminated(e.to_string()))
    }

    /// Wait for `signal`, then drain. Returns early only if the relay task
    /// dies (panic or abort).
    pub async fn run_until<F>(mut self, signal: F) -> Result<RelayReport, RelayError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            joined = &mut self.join => {
                return joined.map_err(|e| RelayError::Terminated(e.to_string()));
            }
            () = signal => {}
        }
        self.shutdown_and_join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::app::RelayConfig;
    use crate::domain::Message;
    use crate::impls::{InMemoryOutboxStore, RecordingProducer};

    #[tokio::test(start_paused = true)]
    async fn shutdown_drains_and_reports() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let mut tx = store.begin().await.unwrap();
        store
            .enqueue(&mut tx, &Message::new("orders", "k", "v"))
            .await
            .unwrap();
        store.commit(tx).await.unwrap();

        let producer = Arc::new(RecordingProducer::new());
        let worker =
            RelayWorker::new(Arc::clone(&store), Arc::clone(&producer), RelayConfig::default()).unwrap();
        let handle = RelayHandle::spawn(worker);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!handle.is_finished());

        let report = handle.shutdown_and_join().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(producer.published().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_until_drains_after_signal() {
        let store = Arc::new(InMemoryOutboxStore::new());
        let producer = Arc::new(RecordingProducer::new());
        let worker = RelayWorker::new(store, producer, RelayConfig::default()).unwrap();

        let report = RelayHandle::spawn(worker)
            .run_until(tokio::time::sleep(Duration::from_millis(2500)))
            .await
            .unwrap();
        assert_eq!(report.cycles, 3);
        assert_eq!(report.idle_cycles, 3);
    }
}
