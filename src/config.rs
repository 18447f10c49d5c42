//! Driver configuration
//!
//! [`DriverConfig`] can be built in code or loaded from YAML. Every field is
//! optional in YAML and falls back to its default:
//!
//! ```yaml
//! queue_size: 100
//! workers: 1
//! session_timeout: 3.0   # seconds
//! max_read_bytes: 1024
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::protocol::MAX_FRAME_SIZE;
use crate::session::SessionOptions;
use crate::{ReachError, Result};

/// Tuning for a [`Driver`](crate::Driver)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Capacity of the dispatch queue; the reader waits while it is full
    pub queue_size: usize,
    /// Number of dispatch workers
    pub workers: usize,
    /// Heartbeat age after which the device is considered disconnected
    #[serde(with = "duration_secs")]
    pub session_timeout: Duration,
    /// Size of the session's rolling read buffer; must hold one full frame
    pub max_read_bytes: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            queue_size: 100,
            workers: 1,
            session_timeout: Duration::from_secs(3),
            max_read_bytes: 1024,
        }
    }
}

impl DriverConfig {
    /// Parse a YAML document and validate the result.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| ReachError::parse_error("driver config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the driver cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue_size == 0 {
            return Err(ReachError::config_error("queue_size must be at least 1"));
        }
        if self.workers == 0 {
            return Err(ReachError::config_error("workers must be at least 1"));
        }
        if self.session_timeout.is_zero() {
            return Err(ReachError::config_error("session_timeout must be positive"));
        }
        if self.max_read_bytes < MAX_FRAME_SIZE {
            return Err(ReachError::config_error(format!(
                "max_read_bytes must be at least {MAX_FRAME_SIZE}, the longest encoded frame"
            )));
        }
        Ok(())
    }

    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_session_timeout(mut self, session_timeout: Duration) -> Self {
        self.session_timeout = session_timeout;
        self
    }

    pub fn with_max_read_bytes(mut self, max_read_bytes: usize) -> Self {
        self.max_read_bytes = max_read_bytes;
        self
    }

    pub(crate) fn session_options(&self) -> SessionOptions {
        SessionOptions { session_timeout: self.session_timeout, max_read_bytes: self.max_read_bytes }
    }
}

/// Durations as fractional seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = DriverConfig::default();
        assert_eq!(config.queue_size, 100);
        assert_eq!(config.workers, 1);
        assert_eq!(config.session_timeout, Duration::from_secs(3));
        assert_eq!(config.max_read_bytes, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() -> anyhow::Result<()> {
        let config = DriverConfig::from_yaml_str("workers: 4\nsession_timeout: 0.5\n")?;
        assert_eq!(config.workers, 4);
        assert_eq!(config.session_timeout, Duration::from_millis(500));
        assert_eq!(config.queue_size, 100);
        Ok(())
    }

    #[test]
    fn yaml_round_trip() -> anyhow::Result<()> {
        let config = DriverConfig::default().with_queue_size(8).with_session_timeout(Duration::from_millis(1500));
        let yaml = serde_yaml_ng::to_string(&config)?;
        assert_eq!(DriverConfig::from_yaml_str(&yaml)?, config);
        Ok(())
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let result = DriverConfig::from_yaml_str("workers: [many]");
        assert!(matches!(result, Err(ReachError::Parse { .. })));

        let result = DriverConfig::from_yaml_str("session_timeout: -1.0");
        assert!(matches!(result, Err(ReachError::Parse { .. })));
    }

    #[test]
    fn zero_values_are_rejected() {
        for config in [
            DriverConfig::default().with_queue_size(0),
            DriverConfig::default().with_workers(0),
            DriverConfig::default().with_session_timeout(Duration::ZERO),
            DriverConfig::default().with_max_read_bytes(0),
        ] {
            assert!(matches!(config.validate(), Err(ReachError::Config { .. })));
        }
    }

    #[test]
    fn read_buffer_must_hold_a_full_frame() {
        let too_small = DriverConfig::default().with_max_read_bytes(MAX_FRAME_SIZE - 1);
        assert!(matches!(too_small.validate(), Err(ReachError::Config { .. })));

        let exact = DriverConfig::default().with_max_read_bytes(MAX_FRAME_SIZE);
        assert!(exact.validate().is_ok());

        let result = DriverConfig::from_yaml_str("max_read_bytes: 64");
        assert!(matches!(result, Err(ReachError::Config { .. })));
    }

    #[test]
    fn session_options_follow_config() {
        let options = DriverConfig::default().with_max_read_bytes(512).session_options();
        assert_eq!(options.max_read_bytes, 512);
        assert_eq!(options.session_timeout, Duration::from_secs(3));
    }
}
