//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（PostgreSQL, Kafka）か、テストで制御したいもの
//! （時刻、id 生成）との境界。
//!
//! # 設計原則
//! - 配送状態の正本（source of truth）はデータベース
//! - ブローカーには `Producer` 経由でしか触らない
//! - relay はこれらの trait にだけ依存し、具体的なクライアントには依存しない

pub mod clock;
pub mod id_generator;
pub mod outbox_store;
pub mod producer;

pub use self::clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::outbox_store::{OutboxStore, StoreError};
pub use self::producer::{ProduceError, Producer};
