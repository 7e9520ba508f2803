//! Server configuration.
//!
//! Only the UDP port and the event-loop thread name are configurable; there
//! is no environment-variable or persisted-file loading here by design — see
//! the OUT OF SCOPE note on CLI/config in the crate root docs.

use std::time::Duration;

use crate::error::ConfigError;

/// Timing constants from the protocol design.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(250);
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(500);
pub const PING_INTERVAL: Duration = Duration::from_millis(500);
pub const DISCOVERY_INTERVAL: Duration = Duration::from_millis(2000);
pub const LIVENESS_TIMEOUT: Duration = Duration::from_millis(1000);
pub const SERIAL_FLUSH_INTERVAL: Duration = Duration::from_millis(500);

/// Default UDP port for the owoTrack/SlimeVR-lineage protocol.
pub const DEFAULT_PORT: u16 = 6969;

/// Immutable configuration for one `EventLoop` instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    port: u16,
    thread_name: String,
    receive_timeout: Duration,
    keepalive_interval: Duration,
    ping_interval: Duration,
    discovery_interval: Duration,
    liveness_timeout: Duration,
    serial_flush_interval: Duration,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    pub fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }

    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    pub fn discovery_interval(&self) -> Duration {
        self.discovery_interval
    }

    pub fn liveness_timeout(&self) -> Duration {
        self.liveness_timeout
    }

    pub fn serial_flush_interval(&self) -> Duration {
        self.serial_flush_interval
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            thread_name: "tracker-event-loop".to_string(),
            receive_timeout: RECEIVE_TIMEOUT,
            keepalive_interval: KEEPALIVE_INTERVAL,
            ping_interval: PING_INTERVAL,
            discovery_interval: DISCOVERY_INTERVAL,
            liveness_timeout: LIVENESS_TIMEOUT,
            serial_flush_interval: SERIAL_FLUSH_INTERVAL,
        }
    }
}

/// Builder for `ServerConfig`, validating the port and thread name.
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    inner: ServerConfig,
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self {
            inner: ServerConfig::default(),
        }
    }
}

impl ServerConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.inner.port = port;
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.inner.thread_name = name.into();
        self
    }

    pub fn receive_timeout(mut self, d: Duration) -> Self {
        self.inner.receive_timeout = d;
        self
    }

    pub fn keepalive_interval(mut self, d: Duration) -> Self {
        self.inner.keepalive_interval = d;
        self
    }

    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.inner.ping_interval = d;
        self
    }

    pub fn discovery_interval(mut self, d: Duration) -> Self {
        self.inner.discovery_interval = d;
        self
    }

    pub fn build(self) -> std::result::Result<ServerConfig, ConfigError> {
        if self.inner.port == 0 {
            return Err(ConfigError::InvalidPort(self.inner.port));
        }
        if self.inner.thread_name.trim().is_empty() {
            return Err(ConfigError::EmptyThreadName);
        }
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_constants() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port(), DEFAULT_PORT);
        assert_eq!(cfg.receive_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.liveness_timeout(), Duration::from_millis(1000));
        assert_eq!(cfg.discovery_interval(), Duration::from_millis(2000));
    }

    #[test]
    fn builder_rejects_zero_port() {
        let err = ServerConfig::builder().port(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(0)));
    }

    #[test]
    fn builder_rejects_empty_thread_name() {
        let err = ServerConfig::builder()
            .thread_name("   ")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyThreadName));
    }

    #[test]
    fn builder_overrides_apply() {
        let cfg = ServerConfig::builder()
            .port(7001)
            .thread_name("custom-loop")
            .build()
            .unwrap();
        assert_eq!(cfg.port(), 7001);
        assert_eq!(cfg.thread_name(), "custom-loop");
    }
}
