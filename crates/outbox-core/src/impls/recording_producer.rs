//! RecordingProducer - Producer のテストダブル
//!
//! 成功したバッチをすべて記録する。失敗は事前に積んでおけて、`produce`
//! 呼び出しごとに FIFO で 1 つずつ返す。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::Message;
use crate::ports::{ProduceError, Producer};

#[derive(Default)]
struct Inner {
    batches: Vec<Vec<Message>>,
    failures: VecDeque<ProduceError>,
    calls: usize,
}

#[derive(Default)]
pub struct RecordingProducer {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

impl RecordingProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` before answering each call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a failure for a future call.
    pub fn fail_next(&self, error: ProduceError) {
        self.lock().failures.push_back(error);
    }

    /// Successful batches, in call order.
    pub fn batches(&self) -> Vec<Vec<Message>> {
        self.lock().batches.clone()
    }

    /// Every successfully published message, flattened.
    pub fn published(&self) -> Vec<Message> {
        self.lock().batches.iter().flatten().cloned().collect()
    }

    /// Number of `produce` calls, failed ones included.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Producer for RecordingProducer {
    async fn produce(&self, messages: &[Message]) -> Result<(), ProduceError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut inner = self.lock();
        inner.calls += 1;
        if let Some(error) = inner.failures.pop_front() {
            return Err(error);
        }
        inner.batches.push(messages.to_vec());
        Ok(())
    }
}
