use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::onvif::endpoint::Credentials;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DiscoveryConfig {
    #[serde(default = "default_multicast_address")]
    pub multicast_address: SocketAddr,
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
    /// Probe rounds; each round sends one datagram per device type.
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
    /// Collection window, measured from socket bind.
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `host[:port]` or a full device service XAddr.
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_request_timeout_ms() -> u64 {
    3000
}

fn default_multicast_address() -> SocketAddr {
    SocketAddr::from(([239, 255, 255, 250], 3702))
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}

fn default_retries() -> u32 {
    3
}

fn default_send_interval_ms() -> u64 {
    150
}

fn default_wait_ms() -> u64 {
    3000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            multicast_address: default_multicast_address(),
            bind_address: default_bind_address(),
            retries: default_retries(),
            send_interval_ms: default_send_interval_ms(),
            wait_ms: default_wait_ms(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .context("Failed to read configuration file")?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .context("Failed to parse YAML configuration")?;

        Ok(config)
    }

    pub fn get_camera(&self, camera_id: &str) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| c.id == camera_id)
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl DiscoveryConfig {
    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

impl CameraConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str(
            r#"
cameras:
  - id: front_door
    address: 192.168.1.100
    username: admin
    password: secret
"#,
        )
        .unwrap();

        assert_eq!(config.client.request_timeout(), Duration::from_millis(3000));
        assert_eq!(config.discovery.multicast_address.to_string(), "239.255.255.250:3702");
        assert_eq!(config.discovery.retries, 3);
        assert_eq!(config.discovery.send_interval(), Duration::from_millis(150));
        assert_eq!(config.discovery.wait(), Duration::from_millis(3000));

        let camera = config.get_camera("front_door").unwrap();
        assert_eq!(camera.display_name(), "front_door");
        assert_eq!(camera.credentials(), Credentials::new("admin", "secret"));
        assert!(config.get_camera("garage").is_none());
    }

    #[test]
    fn test_overrides() {
        let config: AppConfig = serde_yaml::from_str(
            r#"
client:
  request_timeout_ms: 500
discovery:
  bind_address: 192.168.1.5:0
  wait_ms: 1000
"#,
        )
        .unwrap();
        assert_eq!(config.client.request_timeout_ms, 500);
        assert_eq!(config.discovery.bind_address.to_string(), "192.168.1.5:0");
        assert_eq!(config.discovery.wait_ms, 1000);
        assert_eq!(config.discovery.send_interval_ms, 150);
        assert!(config.cameras.is_empty());
    }

    #[test]
    fn test_missing_file() {
        assert!(AppConfig::load_from_file("/nonexistent/cameras.yaml").is_err());
    }
}
