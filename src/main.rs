use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onvif_client::onvif::profile::MediaProfile;
use onvif_client::onvif::types::DeviceInformation;
use onvif_client::{AppConfig, CameraManager, DiscoveredDevice, DiscoveryEngine};

#[derive(Serialize)]
struct Report {
    discovered: Vec<DiscoveredDevice>,
    cameras: Vec<CameraReport>,
}

#[derive(Serialize)]
struct CameraReport {
    id: String,
    information: DeviceInformation,
    profiles: Vec<MediaProfile>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onvif_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ONVIF client");

    // Load configuration
    let config = match std::env::var("CONFIG_PATH") {
        Ok(path) => AppConfig::load_from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        Err(_) => AppConfig::default(),
    };

    tracing::info!("Loaded configuration with {} cameras", config.cameras.len());

    // Probe the local network; Ctrl-C ends the collection window early
    let engine = Arc::new(DiscoveryEngine::new(config.discovery.clone()));
    let interrupt = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                engine.stop_probe();
            }
        })
    };
    let discovered = engine
        .start_probe()
        .await
        .context("Failed to run discovery")?;
    interrupt.abort();

    // Bootstrap every configured camera
    let camera_manager = CameraManager::new(config.client.clone());
    let mut cameras = Vec::new();

    for camera_config in &config.cameras {
        tracing::info!("Adding camera: {} ({})", camera_config.display_name(), camera_config.id);
        match camera_manager.add_camera(camera_config).await {
            Ok(session) => {
                let session = session.read().await;
                cameras.push(CameraReport {
                    id: camera_config.id.clone(),
                    information: session.information().clone(),
                    profiles: session.profiles().to_vec(),
                });
            }
            Err(e) => tracing::warn!("Failed to initialize camera {}: {}", camera_config.id, e),
        }
    }

    let report = serde_yaml::to_string(&Report { discovered, cameras })
        .context("Failed to serialize report")?;
    println!("{}", report);

    Ok(())
}
