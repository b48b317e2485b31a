//! Discover all services and characteristics on a device

use std::env;

use sensortag_core::{ConnectionConfig, DEFAULT_NAME_FILTER, GattClient, uuids};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_NAME_FILTER.to_string());

    println!("Scanning for {}...", filter);
    let client = GattClient::bluetooth(ConnectionConfig::default()).await?;
    let device = client.find_device_by_name(&filter).await?;

    println!("\nFound: {} ({})", device.name(), device.address());
    println!("Connecting...");
    device.connect().await?;
    println!("Connected!");

    println!("\n=== SERVICES AND CHARACTERISTICS ===\n");

    for service in device.services().await? {
        let label = uuids::describe(&service.uuid()).unwrap_or("Unknown");
        println!("Service: {} ({})", service.uuid(), label);

        for characteristic in service.characteristics().await? {
            let flags = characteristic.flags().await?;
            let label = uuids::describe(&characteristic.uuid()).unwrap_or("");
            println!("  Char: {} [{}] {}", characteristic.uuid(), flags.join(","), label);

            if flags.iter().any(|f| f == "read") {
                match characteristic.read().await {
                    Ok(data) => println!("    Value: {:02x?}", data),
                    Err(e) => println!("    Read error: {}", e),
                }
            }
        }
    }

    device.disconnect().await?;
    println!("\nDone.");
    Ok(())
}
