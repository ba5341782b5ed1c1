//! App - アプリケーション層
//!
//! ports を組み合わせて outbox の 2 つのフローを実装します。
//!
//! # 主要コンポーネント
//! - **Enqueuer**: 書き込み側。business write と outbox insert を 1 トランザクションで
//! - **RelayWorker**: 読み出し側。固定 tick で fetch → publish → acknowledge
//! - **RelayHandle**: RelayWorker を tokio タスクで動かし、graceful shutdown する
//! - **RelayConfig**: バッチサイズ、tick 間隔、サイクルごとの timeout

pub mod config;
pub mod enqueue;
pub mod relay_handle;
pub mod relay_worker;

pub use self::config::{ConfigError, RelayConfig};
pub use self::enqueue::{BusinessError, BusinessWrite, EnqueueError, Enqueuer, NoBusinessWrite};
pub use self::relay_handle::RelayHandle;
pub use self::relay_worker::{CycleOutcome, RelayError, RelayReport, RelayWorker};
