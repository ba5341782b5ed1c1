//! Domain identifiers（強い型付けの ID）
//!
//! # ULID + phantom marker
//! outbox の id は `Id<T>` で包んだ ULID。`T` はゼロサイズのマーカー型で、
//! コンパイル時にしか存在しない。16 バイトのまま他の id 型と取り違えられない。
//!
//! ## ULID を使う理由
//! - **時刻順にソート可能**: 上位ビットがタイムスタンプ
//! - **協調なしで生成できる**: どのプロセスでも id を発行できる
//! - **UUID 互換**: 128bit。PostgreSQL では `uuid` 型で保存

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;
use uuid::Uuid;

/// IdMarker provides the display prefix for each id type.
pub trait IdMarker: Send + Sync + 'static {
    /// Display prefix (e.g. "outbox-").
    fn prefix() -> &'static str;
}

/// Generic id type.
///
/// `T` is held in `PhantomData`, so it costs nothing at runtime.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self::from_ulid(Ulid::from(uuid))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }

    /// Storage representation (PostgreSQL `uuid` column).
    pub fn as_uuid(&self) -> Uuid {
        Uuid::from(self.ulid)
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> From<Uuid> for Id<T> {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for outbox records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outbox {}

impl IdMarker for Outbox {
    fn prefix() -> &'static str {
        "outbox-"
    }
}

/// Identifier of an outbox record. Assigned at insert, never reused.
pub type OutboxId = Id<Outbox>;
