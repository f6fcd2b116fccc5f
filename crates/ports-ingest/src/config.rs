//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use ports_common::{PortsError, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::DEFAULT_BUFFER_CAPACITY;

// ============================================================================
// Ingestion Configuration Constants
// ============================================================================

/// Default keyed document read by the file pipeline.
pub const DEFAULT_FILE_PATH: &str = "data/ports.json";

/// Default address the network source listens on.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Default grace period for in-flight calls on shutdown, in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Ingestion configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub buffer_capacity: usize,
    pub file_path: PathBuf,
    pub listen_addr: String,
    pub shutdown_timeout_secs: u64,
}

impl IngestConfig {
    /// Load configuration from `.env`, the environment and defaults
    ///
    /// Nothing is validated here: command-line overrides are applied on top
    /// first, then [`validate`](Self::validate) runs once on the result.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Read `PORTS_*` variables over the defaults, without validating.
    ///
    /// Unparseable numeric values fall back to their default.
    pub fn from_env() -> Self {
        Self {
            buffer_capacity: std::env::var("PORTS_BUFFER_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BUFFER_CAPACITY),
            file_path: std::env::var("PORTS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_FILE_PATH)),
            listen_addr: std::env::var("PORTS_LISTEN_ADDR")
                .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string()),
            shutdown_timeout_secs: std::env::var("PORTS_SHUTDOWN_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        }
    }

    /// Validate the settings every command uses
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(PortsError::InvalidCapacity(self.buffer_capacity));
        }

        if self.file_path.as_os_str().is_empty() {
            return Err(PortsError::Config("File path cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Validate the network endpoint, for commands that listen or connect
    ///
    /// The address is a `host:port` pair; host names such as `localhost` are
    /// resolved when the socket is bound or connected, not here.
    pub fn validate_endpoint(&self) -> Result<()> {
        let invalid = |reason: &str| {
            PortsError::Config(format!(
                "Invalid listen address '{}': {}",
                self.listen_addr, reason
            ))
        };

        let (host, port) = self
            .listen_addr
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;

        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        port.parse::<u16>().map_err(|_| invalid("invalid port"))?;

        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            file_path: PathBuf::from(DEFAULT_FILE_PATH),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 4] = [
        "PORTS_BUFFER_SIZE",
        "PORTS_FILE",
        "PORTS_LISTEN_ADDR",
        "PORTS_SHUTDOWN_TIMEOUT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = IngestConfig::default();

        assert_eq!(config.buffer_capacity, 100);
        assert_eq!(config.file_path, PathBuf::from("data/ports.json"));
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        config.validate().unwrap();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides_defaults() {
        clear_env();
        std::env::set_var("PORTS_BUFFER_SIZE", "7");
        std::env::set_var("PORTS_FILE", "/tmp/other.json");
        std::env::set_var("PORTS_LISTEN_ADDR", "0.0.0.0:9000");

        let config = IngestConfig::from_env();
        clear_env();

        assert_eq!(config.buffer_capacity, 7);
        assert_eq!(config.file_path, PathBuf::from("/tmp/other.json"));
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.shutdown_timeout_secs, DEFAULT_SHUTDOWN_TIMEOUT_SECS);
    }

    #[test]
    #[serial]
    fn test_unparseable_number_falls_back() {
        clear_env();
        std::env::set_var("PORTS_BUFFER_SIZE", "lots");

        let config = IngestConfig::from_env();
        clear_env();

        assert_eq!(config.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
    }

    #[test]
    #[serial]
    fn test_overrides_replace_bad_env_values_before_validation() {
        clear_env();
        std::env::set_var("PORTS_BUFFER_SIZE", "0");
        std::env::set_var("PORTS_LISTEN_ADDR", "not an address");

        let mut config = IngestConfig::load();
        clear_env();

        assert!(matches!(config.validate(), Err(PortsError::InvalidCapacity(0))));
        assert!(config.validate_endpoint().is_err());

        config.buffer_capacity = 5;
        config.validate().unwrap();

        config.listen_addr = "localhost:8080".to_string();
        config.validate_endpoint().unwrap();
    }

    #[test]
    fn test_bad_listen_addr_does_not_affect_file_settings() {
        let config = IngestConfig {
            listen_addr: "nowhere".to_string(),
            ..Default::default()
        };

        config.validate().unwrap();
        assert!(matches!(config.validate_endpoint(), Err(PortsError::Config(_))));
    }

    #[test]
    fn test_validate_endpoint_accepts_host_names() {
        for addr in ["localhost:8080", "127.0.0.1:8080", "ports.internal:50051", "[::1]:8080"] {
            let config = IngestConfig {
                listen_addr: addr.to_string(),
                ..Default::default()
            };
            assert!(config.validate_endpoint().is_ok(), "{addr}");
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = IngestConfig {
            buffer_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(PortsError::InvalidCapacity(0))));

        let no_path = IngestConfig {
            file_path: PathBuf::new(),
            ..Default::default()
        };
        assert!(matches!(no_path.validate(), Err(PortsError::Config(_))));

        for addr in ["localhost", ":8080", "localhost:http", "localhost:70000"] {
            let bad_addr = IngestConfig {
                listen_addr: addr.to_string(),
                ..Default::default()
            };
            assert!(
                matches!(bad_addr.validate_endpoint(), Err(PortsError::Config(_))),
                "{addr}"
            );
        }
    }
}
