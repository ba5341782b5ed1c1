//! ローカル開発・テスト用のスキーマ
//!
//! すべて `IF NOT EXISTS` なので、既存のデータベースに流しても何も起きない。

use outbox_core::ports::StoreError;
use sqlx::PgPool;

use crate::error::store_error;

pub const CREATE_OUTBOX_MESSAGES: &str = r#"
CREATE TABLE IF NOT EXISTS outbox_messages (
    id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    status      TEXT NOT NULL DEFAULT 'undelivered'
                CHECK (status IN ('undelivered', 'delivered')),
    topic       TEXT NOT NULL,
    key         BYTEA NOT NULL,
    value       BYTEA NOT NULL,
    headers     JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

pub const CREATE_UNDELIVERED_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_outbox_messages_undelivered
    ON outbox_messages (created_at, id)
    WHERE status = 'undelivered'
"#;

pub const CREATE_MESSAGE_INFOS: &str = r#"
CREATE TABLE IF NOT EXISTS message_infos (
    id            BIGSERIAL PRIMARY KEY,
    value_length  INTEGER NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

pub async fn run_migrations(pool: &PgPool) -> Result<(), StoreError> {
    for statement in [CREATE_OUTBOX_MESSAGES, CREATE_UNDELIVERED_INDEX, CREATE_MESSAGE_INFOS] {
        sqlx::query(statement).execute(pool).await.map_err(store_error)?;
    }
    tracing::debug!("outbox schema ready");
    Ok(())
}
