pub mod camera;
pub mod config;
pub mod discovery;
pub mod onvif;

pub use camera::{CameraManager, DeviceSession};
pub use config::{AppConfig, CameraConfig, ClientConfig, DiscoveryConfig};
pub use discovery::{DiscoveredDevice, DiscoveryEngine};
pub use onvif::{Credentials, OnvifError, Result};
