//! Server Configuration

use std::time::Duration;

use crate::storage::StorageConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub bind: String,

    /// Port number
    pub port: u16,

    /// Pause between two background expiry sweeps, in milliseconds
    pub reap_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8090,
            reap_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Create a new config with custom port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Create a new config with custom bind address
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Set the background expiry interval
    pub fn with_reap_interval_ms(mut self, interval_ms: u64) -> Self {
        self.reap_interval_ms = interval_ms;
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Engine settings derived from this config. A zero interval is
    /// raised to one millisecond.
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::default()
            .with_reap_interval(Duration::from_millis(self.reap_interval_ms.max(1)))
    }
}
