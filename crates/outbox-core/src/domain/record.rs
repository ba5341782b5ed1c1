//! OutboxRecord - メッセージと配送メタデータ

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::OutboxId;
use super::message::Message;
use super::status::DeliveryStatus;

/// Durable queue entry.
///
/// Design:
/// - `id` and `created_at` are assigned at insert and never change.
/// - `(created_at, id)` is the total order used by fetch.
/// - `status` only moves Undelivered -> Delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: OutboxId,
    pub message: Message,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
}

impl OutboxMessage {
    /// New record, always Undelivered.
    pub fn new(id: OutboxId, message: Message, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            message,
            status: DeliveryStatus::Undelivered,
            created_at,
        }
    }

    pub fn ordering_key(&self) -> (DateTime<Utc>, OutboxId) {
        (self.created_at, self.id)
    }

    pub fn topic(&self) -> &str {
        &self.message.topic
    }

    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }

    /// Mark as delivered. Returns false if it already was.
    pub fn mark_delivered(&mut self) -> bool {
        if self.is_delivered() {
            return false;
        }
        self.status = DeliveryStatus::Delivered;
        true
    }
}

/// Record counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxCounts {
    pub undelivered: u64,
    pub delivered: u64,
}

impl OutboxCounts {
    pub fn total(&self) -> u64 {
        self.undelivered + self.delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ulid::Ulid;

    fn record(secs: i64, random: u128) -> OutboxMessage {
        let created_at = Utc.timestamp_opt(secs, 0).unwrap();
        let id = OutboxId::from_ulid(Ulid::from_parts(secs as u64 * 1000, random));
        OutboxMessage::new(id, Message::new("orders", "k", "v"), created_at)
    }

    #[test]
    fn new_record_is_undelivered() {
        let r = record(10, 1);
        assert_eq!(r.status, DeliveryStatus::Undelivered);
        assert!(!r.is_delivered());
        assert_eq!(r.topic(), "orders");
    }

    #[test]
    fn mark_delivered_is_idempotent() {
        let mut r = record(10, 1);

        assert!(r.mark_delivered());
        assert!(r.is_delivered());
        assert!(!r.mark_delivered());
        assert!(r.is_delivered());
    }

    #[test]
    fn ordering_key_breaks_ties_by_id() {
        let a = record(10, 1);
        let b = record(10, 2);
        let c = record(9, 99);

        let mut keys = vec![b.ordering_key(), a.ordering_key(), c.ordering_key()];
        keys.sort();
        assert_eq!(keys, vec![c.ordering_key(), a.ordering_key(), b.ordering_key()]);
    }

    #[test]
    fn counts_total() {
        let counts = OutboxCounts {
            undelivered: 2,
            delivered: 3,
        };
        assert_eq!(counts.total(), 5);
    }
}
