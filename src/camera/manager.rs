use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::camera::DeviceSession;
use crate::config::{CameraConfig, ClientConfig};
use crate::onvif::error::Result;

pub type SharedSession = Arc<RwLock<DeviceSession>>;

/// Initialized device sessions keyed by camera id.
pub struct CameraManager {
    client: ClientConfig,
    cameras: Arc<RwLock<HashMap<String, SharedSession>>>,
}

impl CameraManager {
    pub fn new(client: ClientConfig) -> Self {
        Self {
            client,
            cameras: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Bootstraps a session for `config` and registers it, replacing any
    /// session with the same id. Nothing is registered if bootstrap fails.
    pub async fn add_camera(&self, config: &CameraConfig) -> Result<SharedSession> {
        let mut session = if config.address.contains("://") {
            DeviceSession::new(&config.address, config.credentials(), &self.client)?
        } else {
            DeviceSession::from_address(&config.address, config.credentials(), &self.client)?
        };
        session.init().await?;

        let session = Arc::new(RwLock::new(session));
        let mut cameras = self.cameras.write().await;
        cameras.insert(config.id.clone(), Arc::clone(&session));

        tracing::info!("Added camera: {} ({})", config.display_name(), config.id);
        Ok(session)
    }

    pub async fn get_session(&self, camera_id: &str) -> Option<SharedSession> {
        let cameras = self.cameras.read().await;
        cameras.get(camera_id).cloned()
    }

    pub async fn remove_camera(&self, camera_id: &str) -> Option<SharedSession> {
        self.cameras.write().await.remove(camera_id)
    }

    /// Registered camera ids, sorted.
    pub async fn camera_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.cameras.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Clone for CameraManager {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            cameras: Arc::clone(&self.cameras),
        }
    }
}

impl Default for CameraManager {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}
