//! RelayConfig - relay worker のチューニング（バッチサイズ、tick 間隔、timeout）

use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("tick interval must be greater than zero")]
    ZeroInterval,

    #[error("cycle timeout must be greater than zero")]
    ZeroTimeout,
}

/// Relay worker settings.
///
/// - `batch_size`: max records fetched and published per cycle
/// - `interval`: time between cycle starts
/// - `timeout`: deadline for one fetch/publish/acknowledge cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    pub batch_size: usize,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RelayConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case(RelayConfig::default().with_batch_size(0), ConfigError::ZeroBatchSize)]
    #[case(RelayConfig::default().with_interval(Duration::ZERO), ConfigError::ZeroInterval)]
    #[case(RelayConfig::default().with_timeout(Duration::ZERO), ConfigError::ZeroTimeout)]
    fn rejects_zero_values(#[case] config: RelayConfig, #[case] expected: ConfigError) {
        assert_eq!(config.validate(), Err(expected));
    }
}
