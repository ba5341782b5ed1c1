//! Impls - 開発・テスト用の ports 実装
//!
//! # 内容
//! - **InMemoryOutboxStore**: インデックス付きの in-memory outbox（トランザクションは staging）
//! - **RecordingProducer**: 全バッチを記録、失敗をスクリプトできる
//! - **LogProducer**: ログ出力で publish する（dry run）
//!
//! # 本番実装
//! 別クレートにある:
//! - `outbox-pg`: PostgresOutboxStore
//! - `outbox-kafka`: KafkaProducer

pub mod inmem_store;
pub mod log_producer;
pub mod recording_producer;

pub use self::inmem_store::{InMemoryOutboxStore, InMemoryTx};
pub use self::log_producer::LogProducer;
pub use self::recording_producer::RecordingProducer;
