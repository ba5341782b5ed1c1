//! IdGenerator port - outbox id の生成
//!
//! # 実装
//! - **UlidGenerator**: Clock のタイムスタンプから単調増加の ULID を作る

use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use crate::domain::OutboxId;
use crate::ports::Clock;
use ulid::{Generator, Ulid};

/// IdGenerator mints outbox ids.
///
/// # Thread Safety
/// - Requires `Send + Sync`; request handlers and the relay share one instance.
pub trait IdGenerator: Send + Sync {
    fn generate_outbox_id(&self) -> OutboxId;
}

/// ULID-based generator.
///
/// Takes its timestamp from a `Clock`, so a `FixedClock` gives ids with a
/// deterministic time component in tests. Ids minted within the same
/// millisecond increase strictly, which keeps `(created_at, id)` in
/// insertion order when timestamps tie.
pub struct UlidGenerator<C> {
    clock: C,
    generator: Mutex<Generator>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            generator: Mutex::new(Generator::new()),
        }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_outbox_id(&self) -> OutboxId {
        let now = self.clock.now();
        let mut generator = self.generator.lock().unwrap_or_else(PoisonError::into_inner);
        // overflow of the 80-bit random part within one ms: fall back to a fresh random id
        let ulid = generator
            .generate_from_datetime(SystemTime::from(now))
            .unwrap_or_else(|_| {
                Ulid::from_parts(now.timestamp_millis().max(0) as u64, rand::random())
            });
        OutboxId::from(ulid)
    }
}
