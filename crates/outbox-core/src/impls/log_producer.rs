//! LogProducer - ブローカーの代わりにログへ「publish」する
//!
//! `outbox worker --dry-run` で使用。メッセージごとに info イベントを出し、
//! バッチは常に成功する。

use async_trait::async_trait;

use crate::domain::Message;
use crate::ports::{ProduceError, Producer};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogProducer;

#[async_trait]
impl Producer for LogProducer {
    async fn produce(&self, messages: &[Message]) -> Result<(), ProduceError> {
        for message in messages {
            tracing::info!(
                topic = %message.topic,
                key = %String::from_utf8_lossy(&message.key),
                value_len = message.value.len(),
                headers = message.headers.len(),
                "dry-run publish"
            );
        }
        Ok(())
    }
}
