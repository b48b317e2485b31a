//! End-to-end scenarios against the in-memory transport.
//!
//! These run without hardware and cover discovery through notification
//! teardown using only the public API.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use sensortag_core::mock::{MockPeripheral, MockTransport, samples};
use sensortag_core::{
    ConnectionConfig, ErrorKind, GattClient, Measurement, SensorKind, SensorTag, uuids,
};

const TAG_ADDRESS: &str = "B0:B4:48:C0:5D:01";

fn setup() -> (Arc<MockTransport>, GattClient) {
    let transport = Arc::new(
        MockTransport::new()
            .with_peripheral(MockPeripheral::new("Kitchen Speaker").rssi(-80))
            .with_peripheral(MockPeripheral::anonymous())
            .with_peripheral(
                MockPeripheral::sensortag("CC2650 SensorTag")
                    .address(TAG_ADDRESS)
                    .rssi(-52)
                    .resolve_after_polls(3),
            ),
    );
    let config = ConnectionConfig::fast().discovery_window(Duration::from_millis(50));
    let client = GattClient::with_config(transport.clone(), config).unwrap();
    (transport, client)
}

#[tokio::test(start_paused = true)]
async fn test_discover_connect_read_and_stream() {
    let (transport, client) = setup();

    let devices = client.discover_devices().await.unwrap();
    assert_eq!(devices.len(), 2, "anonymous peripherals are skipped");
    assert!(!transport.is_discovering());

    let tag = SensorTag::connect(&client, "cc2650").await.unwrap();
    assert_eq!(tag.device().address(), TAG_ADDRESS);
    assert!(tag.device().is_services_resolved().await.unwrap());

    // Gated sensors read as zero until powered on.
    let before = tag.read_raw(SensorKind::Luxometer).await.unwrap();
    assert!(before.iter().all(|b| *b == 0));

    tag.enable_all().await.unwrap();
    for kind in SensorKind::ALL {
        assert_eq!(
            transport.writes(TAG_ADDRESS, kind.config_uuid()).await,
            vec![kind.enable_payload().to_vec()]
        );
    }

    let snapshot = tag.read_environment().await.unwrap();
    assert!((snapshot.object - 25.0).abs() < 1e-9);
    assert!((snapshot.humidity - 50.0).abs() < 1e-9);
    assert!((snapshot.pressure - 1013.25).abs() < 1e-9);
    assert!((snapshot.lux - 16.0).abs() < 1e-9);

    let mut stream = tag.stream(SensorKind::Luxometer).await.unwrap();
    assert!(
        transport
            .notify(TAG_ADDRESS, uuids::LUXOMETER_DATA, &samples::LUXOMETER)
            .await
    );
    match stream.next().await {
        Some(Ok(Measurement::Luxometer(l))) => assert!((l.lux - 16.0).abs() < 1e-9),
        other => panic!("unexpected item: {:?}", other),
    }

    tag.disconnect().await.unwrap();
    assert!(stream.next().await.is_none());
    assert!(!transport.is_connected(TAG_ADDRESS).await);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_filter_reports_not_found() {
    let (_transport, client) = setup();

    let err = SensorTag::connect(&client, "Thermostat").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test(start_paused = true)]
async fn test_connection_gives_up_when_services_never_resolve() {
    let transport = Arc::new(MockTransport::new().with_peripheral(
        MockPeripheral::sensortag("CC2650 SensorTag").never_resolves(),
    ));
    let config = ConnectionConfig::fast()
        .discovery_window(Duration::from_millis(10))
        .resolution_timeout(Duration::from_secs(2));
    let client = GattClient::with_config(transport, config).unwrap();

    let err = SensorTag::connect(&client, "CC2650").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResolutionTimeout);
}

#[tokio::test(start_paused = true)]
async fn test_battery_stream_starts_with_current_level() {
    let (transport, client) = setup();
    let tag = SensorTag::connect(&client, "CC2650").await.unwrap();

    let mut stream = tag.stream_battery_level().await.unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap().percent(), 87);

    transport
        .notify(TAG_ADDRESS, uuids::BATTERY_LEVEL, &[86])
        .await;
    assert_eq!(stream.next().await.unwrap().unwrap().percent(), 86);

    // A malformed payload surfaces as an error item without ending the stream.
    transport.notify(TAG_ADDRESS, uuids::BATTERY_LEVEL, &[]).await;
    assert!(stream.next().await.unwrap().is_err());
    transport
        .notify(TAG_ADDRESS, uuids::BATTERY_LEVEL, &[85])
        .await;
    assert_eq!(stream.next().await.unwrap().unwrap().percent(), 85);
}
