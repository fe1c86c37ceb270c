//! Client configuration.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use xplane_udp_protocol::{HEADER_LEN, MULTICAST_GROUP, MULTICAST_PORT, POSE_RECORD_LEN};

use crate::error::{XPlaneError, XPlaneResult};

/// Beacon silence after which the simulator is considered gone.
pub const DEFAULT_BEACON_TIMEOUT_MS: u64 = 2000;
/// Largest datagram the simulator sends without IP fragmentation.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 1472;
/// Smallest receive buffer that holds a full `RPOS` response.
pub const MIN_RECV_BUFFER_SIZE: usize = HEADER_LEN + POSE_RECORD_LEN;

/// Settings for discovery, reconnection and buffering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Multicast group the beacon is sent to.
    pub multicast_group: Ipv4Addr,
    /// Beacon port. `0` binds an ephemeral port.
    pub beacon_port: u16,
    /// Interface used to join the multicast group.
    pub interface: Ipv4Addr,
    /// Beacon silence (milliseconds) before reporting a disconnect.
    pub beacon_timeout_ms: u64,
    /// Resend all active subscriptions whenever a simulator is (re)discovered.
    pub auto_reconnect: bool,
    /// Receive buffer size for both sockets.
    pub recv_buffer_size: usize,
    /// Pooled send buffers kept per size class.
    pub pool_buffers_per_class: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            multicast_group: MULTICAST_GROUP,
            beacon_port: MULTICAST_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            beacon_timeout_ms: DEFAULT_BEACON_TIMEOUT_MS,
            auto_reconnect: true,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            pool_buffers_per_class: 8,
        }
    }
}

impl ClientConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> XPlaneResult<()> {
        if self.beacon_timeout_ms == 0 {
            return Err(XPlaneError::invalid_configuration(
                "beacon_timeout_ms must be greater than 0",
            ));
        }
        if self.recv_buffer_size < MIN_RECV_BUFFER_SIZE {
            return Err(XPlaneError::invalid_configuration(format!(
                "recv_buffer_size must be at least {MIN_RECV_BUFFER_SIZE} bytes to hold a pose response"
            )));
        }
        if self.pool_buffers_per_class == 0 {
            return Err(XPlaneError::invalid_configuration(
                "pool_buffers_per_class must be greater than 0",
            ));
        }
        Ok(())
    }

    pub fn beacon_timeout(&self) -> Duration {
        Duration::from_millis(self.beacon_timeout_ms)
    }

    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or the values are invalid.
    pub fn from_yaml_str(yaml: &str) -> XPlaneResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| XPlaneError::invalid_configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> XPlaneResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for `ClientConfig`.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    #[must_use]
    pub fn multicast_group(mut self, group: Ipv4Addr) -> Self {
        self.config.multicast_group = group;
        self
    }

    #[must_use]
    pub fn beacon_port(mut self, port: u16) -> Self {
        self.config.beacon_port = port;
        self
    }

    #[must_use]
    pub fn interface(mut self, interface: Ipv4Addr) -> Self {
        self.config.interface = interface;
        self
    }

    #[must_use]
    pub fn beacon_timeout(mut self, timeout: Duration) -> Self {
        self.config.beacon_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    #[must_use]
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = size;
        self
    }

    #[must_use]
    pub fn pool_buffers_per_class(mut self, count: usize) -> Self {
        self.config.pool_buffers_per_class = count;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> XPlaneResult<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
