//! Example: Scanning for BLE Peripherals
//!
//! Scans for the default discovery window and lists every peripheral that
//! advertised a name, marking the ones that look like a SensorTag.
//!
//! Run with: `cargo run --example scan_devices`

use sensortag_core::{ConnectionConfig, DEFAULT_NAME_FILTER, GattClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let client = GattClient::bluetooth(ConnectionConfig::default()).await?;
    println!(
        "Scanning for {:?}...",
        client.config().discovery_window
    );
    println!();

    let devices = client.discover_devices().await?;

    if devices.is_empty() {
        println!("No devices found.");
        println!();
        println!("Make sure:");
        println!("  - Your SensorTag is powered on and advertising (press the power button)");
        println!("  - Bluetooth is enabled on this computer");
        println!("  - The device is within range");
        return Ok(());
    }

    println!("Found {} device(s):", devices.len());
    println!();

    for device in &devices {
        let marker = if device
            .name()
            .to_lowercase()
            .contains(&DEFAULT_NAME_FILTER.to_lowercase())
        {
            " [SensorTag]"
        } else {
            ""
        };
        let rssi = device
            .rssi()
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "N/A".to_string());
        let quality = device
            .signal_quality()
            .map(|q| q.as_str())
            .unwrap_or("unknown");

        println!("  {}{}", device.name(), marker);
        println!("    Address: {}", device.address());
        println!("    RSSI: {} ({})", rssi, quality);
        println!();
    }

    Ok(())
}
