//! DeliveryStatus - outbox レコードのライフサイクル

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// DeliveryStatus of an outbox record.
///
/// State transitions:
/// - Undelivered -> Delivered (relay acknowledged a successful publish)
/// - Delivered -> Delivered (idempotent re-acknowledgment, no-op)
///
/// Delivered -> Undelivered never happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Written by the enqueue path, waiting for the relay.
    Undelivered,

    /// Broker confirmed receipt.
    Delivered,
}

impl DeliveryStatus {
    /// Persisted text form.
    pub const fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Undelivered => "undelivered",
            DeliveryStatus::Delivered => "delivered",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered)
    }

    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        !(self == DeliveryStatus::Delivered && next == DeliveryStatus::Undelivered)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted status outside {undelivered, delivered}.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown delivery status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for DeliveryStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "undelivered" => Ok(DeliveryStatus::Undelivered),
            "delivered" => Ok(DeliveryStatus::Delivered),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
