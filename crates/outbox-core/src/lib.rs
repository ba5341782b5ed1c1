//! outbox-core
//!
//! Transactional outbox relay のコア部品。
//!
//! # モジュール
//! - **domain**: メッセージ/ヘッダ、outbox レコード、配送状態、id
//! - **ports**: OutboxStore, Producer, Clock, IdGenerator
//! - **app**: relay worker、enqueue パス、relay config
//! - **impls**: in-memory store と producer（開発・テスト用）
//!
//! 本番アダプタは兄弟クレート:
//! - `outbox-pg`: PostgresOutboxStore
//! - `outbox-kafka`: KafkaProducer

pub mod domain;
pub mod ports;
pub mod app;
pub mod impls;
