//! Client configuration

use std::path::PathBuf;
use std::time::Duration;

use pomelo_common::DEFAULT_CLUSTER;

/// Configuration for a [`crate::ConfigClient`].
///
/// Only `app_id` and at least one config-service address are required;
/// everything else has the protocol defaults.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Application identity carried in every request
    pub app_id: String,

    /// Logical deployment group
    pub cluster: String,

    /// Config-service base URLs, tried round-robin on failure
    pub config_services: Vec<String>,

    /// Opaque identity tag forwarded as the `label` query parameter
    pub env: Option<String>,

    /// Local cache root
    pub cache_dir: PathBuf,

    /// Access-key secret; when set, requests carry a signature
    pub access_key_secret: Option<String>,

    /// Namespaces per hanging GET; the rest go on concurrent polls
    pub poll_batch_size: usize,

    /// Server-side hold the client expects on the notification endpoint
    pub hold_timeout: Duration,

    pub connect_timeout: Duration,

    pub read_timeout: Duration,

    /// Read timeout of the hanging GET; must exceed the server hold
    pub long_poll_read_timeout: Duration,

    pub backoff_initial: Duration,

    pub backoff_max: Duration,
}

impl ClientConfig {
    /// Create a config for one app against comma-separated service URLs.
    pub fn new(app_id: &str, config_services: &str) -> Self {
        let services = config_services
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            app_id: app_id.to_string(),
            cluster: DEFAULT_CLUSTER.to_string(),
            config_services: services,
            env: None,
            cache_dir: std::env::temp_dir().join("pomelo-cache"),
            access_key_secret: None,
            poll_batch_size: 32,
            hold_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(5),
            long_poll_read_timeout: Duration::from_secs(90),
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(120),
        }
    }

    pub fn with_cluster(mut self, cluster: &str) -> Self {
        self.cluster = cluster.to_string();
        self
    }

    pub fn with_env(mut self, env: &str) -> Self {
        self.env = Some(env.to_string());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_access_key_secret(mut self, secret: &str) -> Self {
        self.access_key_secret = Some(secret.to_string());
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Set the expected server hold; the long-poll read timeout keeps its
    /// safety margin above it.
    pub fn with_hold_timeout(mut self, hold: Duration) -> Self {
        self.hold_timeout = hold;
        self.long_poll_read_timeout = hold + Duration::from_secs(30);
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial = initial;
        self.backoff_max = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("app1", "http://localhost:8070");
        assert_eq!(config.app_id, "app1");
        assert_eq!(config.cluster, "default");
        assert_eq!(config.config_services, ["http://localhost:8070"]);
        assert_eq!(config.poll_batch_size, 32);
        assert_eq!(config.hold_timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert_eq!(config.long_poll_read_timeout, Duration::from_secs(90));
        assert_eq!(config.backoff_initial, Duration::from_secs(1));
        assert_eq!(config.backoff_max, Duration::from_secs(120));
    }

    #[test]
    fn test_comma_separated_services() {
        let config = ClientConfig::new("app1", "http://a:8070, http://b:8070/,http://c:8070");
        assert_eq!(
            config.config_services,
            ["http://a:8070", "http://b:8070", "http://c:8070"]
        );
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("app1", "http://localhost:8070")
            .with_cluster("gray")
            .with_env("PRO")
            .with_cache_dir("/var/cache/pomelo")
            .with_hold_timeout(Duration::from_secs(5));

        assert_eq!(config.cluster, "gray");
        assert_eq!(config.env.as_deref(), Some("PRO"));
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/pomelo"));
        assert_eq!(config.hold_timeout, Duration::from_secs(5));
        assert_eq!(config.long_poll_read_timeout, Duration::from_secs(35));
    }
}
