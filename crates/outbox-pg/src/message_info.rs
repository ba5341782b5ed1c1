//! `message_infos` - サンプルの業務テーブル
//!
//! enqueue したメッセージごとに payload 長を 1 行記録する。CLI の `enqueue` は
//! outbox の行と同じトランザクションでこれを書くので、二重書き込みの結果を
//! `stats` で確認できる。

use async_trait::async_trait;
use outbox_core::app::{BusinessError, BusinessWrite};
use outbox_core::domain::Message;
use outbox_core::ports::StoreError;
use sqlx::PgPool;

use crate::error::store_error;
use crate::store::PgTx;

#[derive(Debug, Default, Clone, Copy)]
pub struct InsertMessageInfo;

#[async_trait]
impl BusinessWrite<PgTx> for InsertMessageInfo {
    async fn apply(&self, tx: &mut PgTx, messages: &[Message]) -> Result<(), BusinessError> {
        for message in messages {
            let value_length = i32::try_from(message.value.len())?;
            sqlx::query("INSERT INTO message_infos (value_length) VALUES ($1)")
                .bind(value_length)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}

pub async fn count_message_infos(pool: &PgPool) -> Result<u64, StoreError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM message_infos")
        .fetch_one(pool)
        .await
        .map_err(store_error)?;
    Ok(u64::try_from(count).unwrap_or_default())
}
