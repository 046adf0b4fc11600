//! Configuration for mcsnap

use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub snapshot: SnapshotConfig,
}

/// Memcached client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address (host:port)
    pub server: String,

    /// Connect timeout in seconds (0 = no timeout)
    pub connect_timeout_secs: u64,

    /// Per-command read deadline in seconds (0 = no timeout)
    pub read_timeout_secs: u64,

    /// Longest response line accepted from the server (bytes)
    pub max_line_bytes: usize,

    /// Initial read buffer size (bytes)
    pub read_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:11211".to_string(),
            connect_timeout_secs: 5,
            read_timeout_secs: 30,
            // Default memcached item size limit plus room for the line ending
            max_line_bytes: 1024 * 1024 + 512,
            read_buffer_size: 8192,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        secs_to_duration(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        secs_to_duration(self.read_timeout_secs)
    }
}

/// Snapshot file configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Pretty-print snapshot JSON
    pub pretty: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

fn secs_to_duration(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            crate::McSnapError::Config(format!("Failed to read config file: {e}"))
        })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        toml::from_str(contents)
            .map_err(|e| crate::McSnapError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables or use defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(server) = std::env::var("MCSNAP_SERVER") {
            config.client.server = server;
        }

        if let Ok(secs) = std::env::var("MCSNAP_CONNECT_TIMEOUT_SECS")
            && let Ok(n) = secs.parse()
        {
            config.client.connect_timeout_secs = n;
        }

        if let Ok(secs) = std::env::var("MCSNAP_READ_TIMEOUT_SECS")
            && let Ok(n) = secs.parse()
        {
            config.client.read_timeout_secs = n;
        }

        if let Ok(pretty) = std::env::var("MCSNAP_PRETTY") {
            config.snapshot.pretty = pretty.to_lowercase() == "true" || pretty == "1";
        }

        config
    }
}
