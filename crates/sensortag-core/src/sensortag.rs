//! High-level driver for the TI SensorTag CC2650.
//!
//! Each sensor sits behind its own GATT service with a data characteristic
//! and a configuration characteristic. Sensors are powered down at boot;
//! [`SensorTag::enable`] writes the configuration characteristic, after which
//! the data characteristic holds live values that can be read once or
//! streamed through notifications.
//!
//! # Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use sensortag_core::{ConnectionConfig, GattClient, SensorTag};
//! use sensortag_types::SensorKind;
//!
//! #[tokio::main]
//! async fn main() -> sensortag_core::Result<()> {
//!     let client = GattClient::bluetooth(ConnectionConfig::default()).await?;
//!     let tag = SensorTag::connect(&client, "CC2650").await?;
//!
//!     tag.enable(SensorKind::Luxometer).await?;
//!     let mut lux = tag.stream_luxometer().await?;
//!     while let Some(reading) = lux.next().await {
//!         println!("{:.2} lux", reading?.lux);
//!     }
//!     tag.disconnect().await
//! }
//! ```

use time::OffsetDateTime;
use tracing::{debug, info};

use sensortag_types::uuid as uuids;
use sensortag_types::{
    Barometer, BatteryLevel, EnvironmentSnapshot, Humidity, IrTemperature, Luxometer,
    Measurement, Movement, ParseResult, SensorKind,
};

use crate::error::{Error, Result};
use crate::gatt::{Characteristic, Device, GattClient};
use crate::streaming::{MeasurementStream, NotifyHandle};

/// Name fragment every CC2650 advertises.
pub const DEFAULT_NAME_FILTER: &str = "CC2650";

/// A connected SensorTag.
#[derive(Debug, Clone)]
pub struct SensorTag {
    device: Device,
}

impl SensorTag {
    /// Discover the first device whose name contains `name_filter` and
    /// connect to it.
    #[tracing::instrument(level = "info", skip(client))]
    pub async fn connect(client: &GattClient, name_filter: &str) -> Result<Self> {
        let device = client.find_device_by_name(name_filter).await?;
        Self::from_device(device).await
    }

    /// Connect to an already discovered device.
    pub async fn from_device(device: Device) -> Result<Self> {
        device.connect().await?;
        info!("SensorTag {} ready", device.name());
        Ok(Self { device })
    }

    /// Wrap a device that is already connected.
    pub fn from_connected(device: Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn name(&self) -> &str {
        self.device.name()
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.device.disconnect().await
    }

    async fn data_characteristic(&self, kind: SensorKind) -> Result<Characteristic> {
        self.device
            .characteristic(kind.service_uuid(), kind.data_uuid())
            .await
    }

    async fn config_characteristic(&self, kind: SensorKind) -> Result<Characteristic> {
        self.device
            .characteristic(kind.service_uuid(), kind.config_uuid())
            .await
    }

    // --- Power ---

    /// Power up a sensor.
    pub async fn enable(&self, kind: SensorKind) -> Result<()> {
        self.config_characteristic(kind)
            .await?
            .write(kind.enable_payload())
            .await?;
        info!("Enabled {}", kind);
        Ok(())
    }

    /// Power down a sensor.
    pub async fn disable(&self, kind: SensorKind) -> Result<()> {
        self.config_characteristic(kind)
            .await?
            .write(kind.disable_payload())
            .await?;
        info!("Disabled {}", kind);
        Ok(())
    }

    /// Power up every sensor, stopping at the first failure.
    pub async fn enable_all(&self) -> Result<()> {
        for kind in SensorKind::ALL {
            self.enable(kind).await?;
        }
        Ok(())
    }

    // --- Read once ---

    /// Raw payload of a sensor's data characteristic.
    pub async fn read_raw(&self, kind: SensorKind) -> Result<Vec<u8>> {
        self.data_characteristic(kind).await?.read().await
    }

    /// Read and decode one sample.
    pub async fn read(&self, kind: SensorKind) -> Result<Measurement> {
        let data = self.read_raw(kind).await?;
        debug!("{} payload: {:02x?}", kind, data);
        Ok(kind.decode(&data)?)
    }

    async fn read_as<T>(&self, kind: SensorKind, decode: fn(&[u8]) -> ParseResult<T>) -> Result<T> {
        let data = self.read_raw(kind).await?;
        Ok(decode(&data)?)
    }

    pub async fn read_ir_temperature(&self) -> Result<IrTemperature> {
        self.read_as(SensorKind::IrTemperature, IrTemperature::from_bytes)
            .await
    }

    pub async fn read_humidity(&self) -> Result<Humidity> {
        self.read_as(SensorKind::Humidity, Humidity::from_bytes).await
    }

    pub async fn read_barometer(&self) -> Result<Barometer> {
        self.read_as(SensorKind::Barometer, Barometer::from_bytes).await
    }

    pub async fn read_luxometer(&self) -> Result<Luxometer> {
        self.read_as(SensorKind::Luxometer, Luxometer::from_bytes).await
    }

    pub async fn read_movement(&self) -> Result<Movement> {
        self.read_as(SensorKind::Movement, Movement::from_bytes).await
    }

    /// Read the four environmental sensors back to back.
    ///
    /// The sensors must already be enabled.
    pub async fn read_environment(&self) -> Result<EnvironmentSnapshot> {
        let ir = self.read_ir_temperature().await?;
        let humidity = self.read_humidity().await?;
        let barometer = self.read_barometer().await?;
        let luxometer = self.read_luxometer().await?;
        Ok(EnvironmentSnapshot::new(
            ir,
            humidity,
            barometer,
            luxometer,
            OffsetDateTime::now_utc(),
        ))
    }

    // --- Streaming ---

    async fn stream_as<T>(
        &self,
        kind: SensorKind,
        decode: fn(&[u8]) -> ParseResult<T>,
    ) -> Result<MeasurementStream<T>>
    where
        T: Send + 'static,
    {
        self.data_characteristic(kind)
            .await?
            .subscribe_with(None, move |value| decode(&value).map_err(Error::from))
            .await
    }

    /// Stream decoded samples as the sensor notifies them.
    pub async fn stream(&self, kind: SensorKind) -> Result<MeasurementStream<Measurement>> {
        self.data_characteristic(kind)
            .await?
            .subscribe_with(None, move |value| kind.decode(&value).map_err(Error::from))
            .await
    }

    pub async fn stream_ir_temperature(&self) -> Result<MeasurementStream<IrTemperature>> {
        self.stream_as(SensorKind::IrTemperature, IrTemperature::from_bytes)
            .await
    }

    pub async fn stream_humidity(&self) -> Result<MeasurementStream<Humidity>> {
        self.stream_as(SensorKind::Humidity, Humidity::from_bytes).await
    }

    pub async fn stream_barometer(&self) -> Result<MeasurementStream<Barometer>> {
        self.stream_as(SensorKind::Barometer, Barometer::from_bytes).await
    }

    pub async fn stream_luxometer(&self) -> Result<MeasurementStream<Luxometer>> {
        self.stream_as(SensorKind::Luxometer, Luxometer::from_bytes).await
    }

    pub async fn stream_movement(&self) -> Result<MeasurementStream<Movement>> {
        self.stream_as(SensorKind::Movement, Movement::from_bytes).await
    }

    /// Invoke `callback` with each decoded sample.
    ///
    /// See [`NotifyHandle`] for cancellation semantics.
    pub async fn watch<F>(&self, kind: SensorKind, mut callback: F) -> Result<NotifyHandle>
    where
        F: FnMut(Result<Measurement>) + Send + 'static,
    {
        self.data_characteristic(kind)
            .await?
            .start_notify(move |value| callback(kind.decode(value).map_err(Error::from)))
            .await
    }

    // --- Battery ---

    async fn battery_characteristic(&self) -> Result<Characteristic> {
        self.device
            .characteristic(uuids::BATTERY_SERVICE, uuids::BATTERY_LEVEL)
            .await
    }

    pub async fn read_battery_level(&self) -> Result<BatteryLevel> {
        let data = self.battery_characteristic().await?.read().await?;
        Ok(BatteryLevel::from_bytes(&data)?)
    }

    /// Stream the battery level, starting with the current value.
    pub async fn stream_battery_level(&self) -> Result<MeasurementStream<BatteryLevel>> {
        let characteristic = self.battery_characteristic().await?;
        let current = characteristic
            .read()
            .await
            .and_then(|data| BatteryLevel::from_bytes(&data).map_err(Error::from));
        characteristic
            .subscribe_with(Some(current), |value| {
                BatteryLevel::from_bytes(&value).map_err(Error::from)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;
    use crate::ConnectionConfig;
    use crate::mock::{MockPeripheral, MockService, MockTransport, samples};

    const ADDRESS: &str = "B0:B4:48:C0:5D:03";

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    async fn tag_with(peripheral: MockPeripheral) -> (Arc<MockTransport>, SensorTag) {
        let transport = Arc::new(MockTransport::new().with_peripheral(peripheral.address(ADDRESS)));
        let config = ConnectionConfig::default().discovery_window(Duration::from_millis(50));
        let client = GattClient::with_config(transport.clone(), config).unwrap();
        let tag = SensorTag::connect(&client, DEFAULT_NAME_FILTER).await.unwrap();
        (transport, tag)
    }

    async fn tag() -> (Arc<MockTransport>, SensorTag) {
        tag_with(MockPeripheral::sensortag("CC2650 SensorTag")).await
    }

    #[tokio::test]
    async fn test_enable_writes_documented_payloads() {
        let (transport, tag) = tag().await;
        tag.enable_all().await.unwrap();

        for kind in [
            SensorKind::IrTemperature,
            SensorKind::Humidity,
            SensorKind::Barometer,
            SensorKind::Luxometer,
        ] {
            assert_eq!(
                transport.writes(ADDRESS, kind.config_uuid()).await,
                vec![vec![0x01]]
            );
        }
        assert_eq!(
            transport.writes(ADDRESS, SensorKind::Movement.config_uuid()).await,
            vec![vec![0xFF, 0x00]]
        );
    }

    #[tokio::test]
    async fn test_disable_writes_zeros() {
        let (transport, tag) = tag().await;
        tag.enable(SensorKind::Movement).await.unwrap();
        tag.disable(SensorKind::Movement).await.unwrap();

        assert_eq!(
            transport.writes(ADDRESS, uuids::MOVEMENT_CONFIG).await,
            vec![vec![0xFF, 0x00], vec![0x00, 0x00]]
        );
    }

    #[tokio::test]
    async fn test_read_before_enable_is_zero() {
        let (_transport, tag) = tag().await;
        let lux = tag.read_luxometer().await.unwrap();
        assert_eq!(lux.lux, 0.0);
    }

    #[tokio::test]
    async fn test_read_once_decodes() {
        let (_transport, tag) = tag().await;
        tag.enable_all().await.unwrap();

        let ir = tag.read_ir_temperature().await.unwrap();
        assert!(approx(ir.object, 25.0));
        assert!(approx(ir.ambient, 20.0));

        let humidity = tag.read_humidity().await.unwrap();
        assert!(approx(humidity.temperature, 21.875));
        assert!(approx(humidity.humidity, 50.0));

        let barometer = tag.read_barometer().await.unwrap();
        assert!(approx(barometer.temperature, 21.5));
        assert!(approx(barometer.pressure, 1013.25));

        let movement = tag.read_movement().await.unwrap();
        assert!(approx(movement.gyro.x, 1.0));
        assert!(approx(movement.accel.z, 0.25));

        match tag.read(SensorKind::Luxometer).await.unwrap() {
            Measurement::Luxometer(l) => assert!(approx(l.lux, 16.0)),
            other => panic!("unexpected measurement: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_environment() {
        let (_transport, tag) = tag().await;
        tag.enable_all().await.unwrap();

        let snapshot = tag.read_environment().await.unwrap();
        assert!(approx(snapshot.ambient, 20.0));
        assert!(approx(snapshot.object, 25.0));
        assert!(approx(snapshot.humidity, 50.0));
        assert!(approx(snapshot.pressure, 1013.25));
        assert!(approx(snapshot.lux, 16.0));
    }

    #[tokio::test]
    async fn test_short_payload_is_invalid_data() {
        let (transport, tag) = tag().await;
        tag.enable(SensorKind::Barometer).await.unwrap();
        transport
            .set_value(ADDRESS, uuids::BAROMETER_DATA, &[0x01, 0x02])
            .await;

        let err = tag.read_barometer().await.unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidReadingFormat {
                expected: 6,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_sensor_service() {
        let (_transport, tag) = tag_with(
            MockPeripheral::new("CC2650").service(MockService::battery(50)),
        )
        .await;

        let err = tag.enable(SensorKind::Humidity).await.unwrap_err();
        assert!(
            matches!(err, Error::ServiceNotFound { uuid, .. } if uuid == uuids::HUMIDITY_SERVICE)
        );
        assert_eq!(tag.read_battery_level().await.unwrap().percent(), 50);
    }

    #[tokio::test]
    async fn test_stream_decodes_notifications() {
        let (transport, tag) = tag().await;
        tag.enable(SensorKind::Humidity).await.unwrap();
        let mut stream = tag.stream_humidity().await.unwrap();

        transport
            .notify(ADDRESS, uuids::HUMIDITY_DATA, &samples::HUMIDITY)
            .await;
        transport
            .notify(ADDRESS, uuids::HUMIDITY_DATA, &[0x00, 0x00])
            .await;

        let reading = stream.next().await.unwrap().unwrap();
        assert!(approx(reading.temperature, 21.875));
        assert!(approx(reading.humidity, 50.0));

        let bad = stream.next().await.unwrap();
        assert!(matches!(bad, Err(Error::InvalidReadingFormat { .. })));

        stream.close();
    }

    #[tokio::test]
    async fn test_generic_stream() {
        let (transport, tag) = tag().await;
        let mut stream = tag.stream(SensorKind::Movement).await.unwrap();

        transport
            .notify(ADDRESS, uuids::MOVEMENT_DATA, &samples::MOVEMENT)
            .await;
        let measurement = stream.next().await.unwrap().unwrap();
        assert_eq!(measurement.kind(), SensorKind::Movement);
    }

    #[tokio::test]
    async fn test_watch_callback() {
        let (transport, tag) = tag().await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let handle = tag
            .watch(SensorKind::IrTemperature, move |m| {
                if let Ok(Measurement::IrTemperature(ir)) = m {
                    sink.lock().unwrap().push(ir.object);
                }
            })
            .await
            .unwrap();

        transport
            .notify(ADDRESS, uuids::IR_TEMPERATURE_DATA, &samples::IR_TEMPERATURE)
            .await;
        for _ in 0..100 {
            if !seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(*seen.lock().unwrap(), vec![25.0]);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_battery_stream_starts_with_current_value() {
        let (transport, tag) = tag().await;
        assert_eq!(tag.read_battery_level().await.unwrap(), BatteryLevel(87));

        let mut stream = tag.stream_battery_level().await.unwrap();
        transport.notify(ADDRESS, uuids::BATTERY_LEVEL, &[86]).await;

        assert_eq!(stream.next().await.unwrap().unwrap(), BatteryLevel(87));
        assert_eq!(stream.next().await.unwrap().unwrap(), BatteryLevel(86));
    }

    #[tokio::test]
    async fn test_disconnect() {
        let (transport, tag) = tag().await;
        assert!(transport.is_connected(ADDRESS).await);
        tag.disconnect().await.unwrap();
        assert!(!transport.is_connected(ADDRESS).await);
        assert!(tag.read_battery_level().await.is_err());
    }
}
