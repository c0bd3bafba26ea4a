//! Configuration for the memcached client.

use nscache_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for the memcached client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemcacheConfig {
    /// Server addresses (`host:port`). Keys are spread across all of them.
    #[serde(default = "default_servers")]
    pub servers: Vec<String>,
    /// Timeout for establishing a connection.
    #[serde(default = "default_connect_timeout", with = "duration_ms")]
    pub connect_timeout: Duration,
    /// Timeout for a single command round trip.
    #[serde(default = "default_io_timeout", with = "duration_ms")]
    pub io_timeout: Duration,
    /// Compression threshold applied when a write does not specify one.
    #[serde(default)]
    pub default_compress_threshold: Option<usize>,
}

fn default_servers() -> Vec<String> {
    vec!["127.0.0.1:11211".to_string()]
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_io_timeout() -> Duration {
    Duration::from_secs(1)
}

impl Default for MemcacheConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            connect_timeout: default_connect_timeout(),
            io_timeout: default_io_timeout(),
            default_compress_threshold: None,
        }
    }
}

impl MemcacheConfig {
    /// Create a new config with a single server.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            servers: vec![server.into()],
            ..Default::default()
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Set multiple servers.
    pub fn with_servers(mut self, servers: Vec<String>) -> Self {
        self.servers = servers;
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-command timeout.
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Compress values of at least `threshold` bytes unless a write says otherwise.
    pub fn with_compress_threshold(mut self, threshold: usize) -> Self {
        self.default_compress_threshold = Some(threshold);
        self
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(Error::Config("at least one server is required".to_string()));
        }
        if let Some(bad) = self.servers.iter().find(|s| s.trim().is_empty()) {
            return Err(Error::Config(format!("invalid server address {:?}", bad)));
        }
        if self.io_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(Error::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = MemcacheConfig::default();
        assert_eq!(config.servers, vec!["127.0.0.1:11211".to_string()]);
        assert_eq!(config.io_timeout, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = MemcacheConfig::new("cache-a:11211")
            .with_servers(vec!["cache-a:11211".into(), "cache-b:11211".into()])
            .with_io_timeout(Duration::from_millis(250))
            .with_compress_threshold(4096);

        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.io_timeout, Duration::from_millis(250));
        assert_eq!(config.default_compress_threshold, Some(4096));
    }

    #[test]
    fn test_yaml_with_partial_fields() {
        let yaml = r#"
servers: ["10.0.0.1:11211", "10.0.0.2:11211"]
io_timeout: 300
"#;
        let config: MemcacheConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.io_timeout, Duration::from_millis(300));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.default_compress_threshold, None);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memcache.yaml");
        std::fs::write(&path, "servers: [\"cache:11211\"]\ndefault_compress_threshold: 2048\n")
            .unwrap();

        let config = MemcacheConfig::from_file(&path).unwrap();
        assert_eq!(config.servers, vec!["cache:11211".to_string()]);
        assert_eq!(config.default_compress_threshold, Some(2048));
    }

    #[test]
    fn test_validate_rejects_empty_servers() {
        let config = MemcacheConfig::default().with_servers(vec![]);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = MemcacheConfig::new("  ");
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
