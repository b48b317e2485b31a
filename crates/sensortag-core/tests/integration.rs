//! Integration tests for sensortag-core
//!
//! These tests require a powered-on SensorTag and should be run with:
//! `cargo test --package sensortag-core -- --ignored --nocapture`
//!
//! Set the SENSORTAG_DEVICE environment variable to choose the device name filter:
//! `SENSORTAG_DEVICE="CC2650 SensorTag" cargo test --package sensortag-core -- --ignored`
//!
//! If not set, tests will use "CC2650" as the filter.

use std::env;
use std::time::Duration;

use futures::StreamExt;
use sensortag_core::{ConnectionConfig, GattClient, SensorKind, SensorTag, uuids};
use tokio::time::timeout;

/// Default timeout for BLE operations.
const BLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Get the device name filter from environment or use default.
fn get_device_filter() -> String {
    env::var("SENSORTAG_DEVICE").unwrap_or_else(|_| sensortag_core::DEFAULT_NAME_FILTER.to_string())
}

async fn connect() -> SensorTag {
    let client = GattClient::bluetooth(ConnectionConfig::default())
        .await
        .expect("Bluetooth adapter unavailable");
    let filter = get_device_filter();
    match timeout(BLE_TIMEOUT, SensorTag::connect(&client, &filter)).await {
        Ok(Ok(tag)) => tag,
        Ok(Err(e)) => panic!("Failed to connect to {}: {}", filter, e),
        Err(_) => panic!("Connection timed out after {:?}", BLE_TIMEOUT),
    }
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_discover_devices() {
    let client = GattClient::bluetooth(ConnectionConfig::default())
        .await
        .expect("Bluetooth adapter unavailable");

    let result = timeout(BLE_TIMEOUT, client.discover_devices()).await;

    match result {
        Ok(Ok(devices)) => {
            println!("Found {} devices", devices.len());
            for device in devices {
                println!("  {} ({}) {:?} dBm", device.name(), device.address(), device.rssi());
            }
        }
        Ok(Err(e)) => panic!("Discovery failed: {}", e),
        Err(_) => panic!("Discovery timed out after {:?}", BLE_TIMEOUT),
    }
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_services_include_sensors() {
    let tag = connect().await;

    let services = tag.device().services().await.expect("services");
    let found: Vec<_> = services.iter().map(|s| s.uuid()).collect();
    println!("Services: {:?}", found);

    for kind in SensorKind::ALL {
        assert!(found.contains(&kind.service_uuid()), "missing {} service", kind);
    }
    assert!(found.contains(&uuids::BATTERY_SERVICE));

    tag.disconnect().await.expect("disconnect");
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_read_all_sensors() {
    let tag = connect().await;
    tag.enable_all().await.expect("enable sensors");
    tokio::time::sleep(Duration::from_secs(1)).await;

    for kind in SensorKind::ALL {
        let measurement = tag.read(kind).await.expect("read");
        println!("{}", measurement);
    }

    let battery = tag.read_battery_level().await.expect("battery");
    assert!(battery.percent() <= 100);

    tag.disconnect().await.expect("disconnect");
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_luxometer_notifications() {
    let tag = connect().await;
    tag.enable(SensorKind::Luxometer).await.expect("enable");

    let mut stream = tag.stream_luxometer().await.expect("subscribe");
    for _ in 0..3 {
        match timeout(Duration::from_secs(5), stream.next()).await {
            Ok(Some(Ok(reading))) => println!("{:.2} lux", reading.lux),
            Ok(Some(Err(e))) => panic!("decode failed: {}", e),
            Ok(None) => panic!("stream ended"),
            Err(_) => panic!("no notification within 5s"),
        }
    }
    stream.close();

    tag.disconnect().await.expect("disconnect");
}
