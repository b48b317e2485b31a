//! Example: Reading SensorTag Values
//!
//! Connects to the first SensorTag whose name matches the argument
//! (default "CC2650"), enables every sensor and prints one reading of each.
//!
//! Run with: `cargo run --example read_sensor -- [NAME_FILTER]`

use std::env;
use std::time::Duration;

use sensortag_core::{ConnectionConfig, DEFAULT_NAME_FILTER, GattClient, SensorTag};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let filter = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_NAME_FILTER.to_string());

    println!("Looking for {}...", filter);
    let client = GattClient::bluetooth(ConnectionConfig::default()).await?;
    let tag = SensorTag::connect(&client, &filter).await?;
    println!("Connected to {} ({})", tag.name(), tag.device().address());
    println!();

    tag.enable_all().await?;
    // Sensors need one conversion period before the first valid sample.
    tokio::time::sleep(Duration::from_secs(1)).await;

    let ir = tag.read_ir_temperature().await?;
    let humidity = tag.read_humidity().await?;
    let barometer = tag.read_barometer().await?;
    let lux = tag.read_luxometer().await?;
    let movement = tag.read_movement().await?;
    let battery = tag.read_battery_level().await?;

    println!("Current Readings:");
    println!("  Object:      {:.2} °C", ir.object);
    println!("  Ambient:     {:.2} °C", ir.ambient);
    println!("  Humidity:    {:.1} %RH ({:.2} °C)", humidity.humidity, humidity.temperature);
    println!("  Pressure:    {:.2} hPa ({:.2} °C)", barometer.pressure, barometer.temperature);
    println!("  Light:       {:.2} lux", lux.lux);
    println!("  Gyroscope:   {} °/s", movement.gyro);
    println!("  Accel:       {} g", movement.accel);
    println!("  Magnetometer:{} µT", movement.mag);
    println!("  Battery:     {}", battery);

    tag.disconnect().await?;
    println!();
    println!("Disconnected.");

    Ok(())
}
