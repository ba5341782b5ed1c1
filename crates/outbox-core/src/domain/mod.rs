//! Domain - ドメインモデル（id、メッセージ、outbox レコード、配送状態、エラー）

pub mod errors;
pub mod ids;
pub mod message;
pub mod record;
pub mod status;

pub use self::errors::{ErrorKind, ValidationError};
pub use self::ids::{Id, IdMarker, OutboxId};
pub use self::message::{Header, Message};
pub use self::record::{OutboxCounts, OutboxMessage};
pub use self::status::{DeliveryStatus, UnknownStatus};
