//! WS-Discovery of ONVIF devices on the local network.
//!
//! A probe run binds one UDP socket, sends a Probe for every device type in
//! [`probe::DEVICE_TYPES`] `retries` times (one datagram per
//! `send_interval`), and collects ProbeMatch replies until `wait` has elapsed
//! since the bind. Devices are deduplicated by urn; the first answer wins.

pub mod probe;

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::DiscoveryConfig;
use crate::onvif::error::{OnvifError, Result};

pub use probe::{build_probe, parse_probe_matches, DiscoveredDevice, DEVICE_TYPES};

const MAX_DATAGRAM: usize = 65_535;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    /// Probes are still being sent.
    Probing,
    /// All probes sent; waiting out the collection window.
    Collecting,
}

#[derive(Debug)]
struct Run {
    state: ProbeState,
    stop: Option<Arc<Notify>>,
}

pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    run: Mutex<Run>,
}

impl DiscoveryEngine {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config,
            run: Mutex::new(Run {
                state: ProbeState::Idle,
                stop: None,
            }),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn state(&self) -> ProbeState {
        self.lock().state
    }

    /// Runs one probe and returns every distinct device that answered.
    ///
    /// Fails with [`OnvifError::ProbeInProgress`] if a run is already active
    /// and with [`OnvifError::Bind`] if the socket cannot be bound.
    pub async fn start_probe(&self) -> Result<Vec<DiscoveredDevice>> {
        let stop = {
            let mut run = self.lock();
            if run.state != ProbeState::Idle {
                return Err(OnvifError::ProbeInProgress);
            }
            let stop = Arc::new(Notify::new());
            run.state = ProbeState::Probing;
            run.stop = Some(Arc::clone(&stop));
            stop
        };
        let _reset = ResetOnDrop(self);

        let socket = UdpSocket::bind(self.config.bind_address)
            .await
            .map_err(OnvifError::Bind)?;
        let deadline = Instant::now() + self.config.wait();
        let socket = Arc::new(socket);

        tracing::debug!(
            "Probing {} from {:?}",
            self.config.multicast_address,
            socket.local_addr().ok()
        );

        let mut sender = SenderTask(tokio::spawn(send_probes(
            Arc::clone(&socket),
            self.config.multicast_address,
            self.config.retries,
            self.config.send_interval(),
        )));
        let mut sending = true;

        let mut buffer = vec![0u8; MAX_DATAGRAM];
        let mut seen = HashSet::new();
        let mut devices = Vec::new();

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                _ = stop.notified() => {
                    tracing::debug!("Probe stopped early with {} devices", devices.len());
                    break;
                }
                _ = &mut sender.0, if sending => {
                    sending = false;
                    self.set_state(ProbeState::Collecting);
                }
                received = socket.recv_from(&mut buffer) => match received {
                    Ok((len, from)) => {
                        for device in parse_probe_matches(&buffer[..len]) {
                            if seen.insert(device.urn.clone()) {
                                tracing::debug!("Discovered {} at {} ({})", device.urn, from, device.name);
                                devices.push(device);
                            }
                        }
                    }
                    Err(e) => tracing::warn!("Discovery receive failed: {}", e),
                },
            }
        }

        tracing::info!("Discovery finished with {} devices", devices.len());
        Ok(devices)
    }

    /// Ends the active run early. Does nothing when no run is active.
    pub fn stop_probe(&self) {
        if let Some(stop) = self.lock().stop.as_ref() {
            stop.notify_one();
        }
    }

    fn set_state(&self, state: ProbeState) {
        self.lock().state = state;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Run> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DiscoveryEngine {
    fn default() -> Self {
        Self::new(DiscoveryConfig::default())
    }
}

/// Returns the engine to `Idle` however the run ends, including cancellation.
struct ResetOnDrop<'a>(&'a DiscoveryEngine);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        let mut run = self.0.lock();
        run.state = ProbeState::Idle;
        run.stop = None;
    }
}

struct SenderTask(JoinHandle<()>);

impl Drop for SenderTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn send_probes(socket: Arc<UdpSocket>, target: SocketAddr, retries: u32, interval: Duration) {
    for round in 0..retries {
        for device_type in DEVICE_TYPES {
            let probe = build_probe(device_type, Uuid::new_v4());
            if let Err(e) = socket.send_to(probe.as_bytes(), target).await {
                tracing::warn!("Failed to send {} probe (round {}): {}", device_type, round + 1, e);
            }
            tokio::time::sleep(interval).await;
        }
    }
}
