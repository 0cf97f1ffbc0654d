// Manual check of the bootstrap sequence against a real camera
// Run with: ONVIF_ADDRESS=192.168.1.20:8000 ONVIF_USER=admin ONVIF_PASS=secret cargo run --bin test_session_init

use onvif_client::onvif::profile::StreamProtocol;
use onvif_client::{ClientConfig, Credentials, DeviceSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let address = std::env::var("ONVIF_ADDRESS").unwrap_or_else(|_| "192.168.1.20".to_string());
    let credentials = Credentials::new(
        std::env::var("ONVIF_USER").unwrap_or_default(),
        std::env::var("ONVIF_PASS").unwrap_or_default(),
    );

    let mut session = if address.contains("://") {
        DeviceSession::new(&address, credentials, &ClientConfig::default())?
    } else {
        DeviceSession::from_address(&address, credentials, &ClientConfig::default())?
    };

    println!("\n=== Initializing {} ===", session.endpoint().url());
    let info = session.init().await?;
    println!("{} {} (firmware {}, serial {})", info.manufacturer, info.model, info.firmware_version, info.serial_number);
    println!("Clock offset: {} ms", session.clock_offset().as_millis());

    println!("\n=== Profiles ===");
    for profile in session.profiles() {
        println!("[{}] {}", profile.token, profile.name);
        if let Some(encoder) = &profile.video.encoder {
            println!(
                "    {} {}x{} @ {} fps",
                encoder.encoding, encoder.resolution.width, encoder.resolution.height, encoder.framerate
            );
        }
        for protocol in StreamProtocol::ALL {
            match profile.stream.get(protocol) {
                Some(uri) => println!("    {}: {}", protocol, uri),
                None => println!("    {}: -", protocol),
            }
        }
        println!("    snapshot: {}", profile.snapshot.as_deref().unwrap_or("-"));
    }

    println!("\n=== Snapshot ===");
    match session.fetch_snapshot().await {
        Ok(snapshot) => println!("{} bytes of {}", snapshot.body.len(), snapshot.content_type),
        Err(e) => eprintln!("Snapshot Error: {}", e),
    }

    Ok(())
}
