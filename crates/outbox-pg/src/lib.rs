//! outbox-pg
//!
//! outbox の PostgreSQL アダプタ。
//!
//! # 内容
//! - **PostgresOutboxStore**: sqlx の `PgPool` 上の `OutboxStore`
//! - **schema**: `outbox_messages` と `message_infos` の冪等な DDL
//! - **InsertMessageInfo**: CLI が使うサンプルの business write

mod error;
mod headers;
pub mod message_info;
pub mod schema;
mod store;

pub use self::error::store_error;
pub use self::message_info::{InsertMessageInfo, count_message_infos};
pub use self::schema::run_migrations;
pub use self::store::{PgTx, PostgresOutboxStore, connect};
