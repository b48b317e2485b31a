//! BLE client library for the TI SensorTag CC2650.
//!
//! This crate talks to the SensorTag through a GATT client layered over a
//! pluggable [`Transport`]:
//!
//! - **Discovery**: scan for a fixed window and list named peripherals
//! - **Connection**: connect and wait, with a bound, for the GATT tree to resolve
//! - **Traversal**: look up services and characteristics by UUID
//! - **Characteristic I/O**: read, write, and notifications as callbacks or streams
//! - **Sensors**: the [`SensorTag`] driver enables sensors and decodes their payloads
//!
//! Decoding lives in [`sensortag_types`], which has no Bluetooth dependency.
//!
//! # Platform Differences
//!
//! - **Linux/Windows**: devices are identified by their Bluetooth MAC address.
//! - **macOS**: CoreBluetooth hides MAC addresses; devices are identified by a
//!   UUID that is stable per Mac but differs between machines.
//!
//! # Quick Start
//!
//! ```no_run
//! use sensortag_core::{ConnectionConfig, GattClient, SensorTag};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GattClient::bluetooth(ConnectionConfig::default()).await?;
//!     let tag = SensorTag::connect(&client, "CC2650").await?;
//!
//!     tag.enable_all().await?;
//!     let snapshot = tag.read_environment().await?;
//!     println!("{:.1} °C, {:.1} %RH", snapshot.ambient, snapshot.humidity);
//!
//!     tag.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Testing Without Hardware
//!
//! [`mock::MockTransport`] serves the same object tree from memory:
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sensortag_core::{ConnectionConfig, GattClient, SensorTag};
//! use sensortag_core::mock::{MockPeripheral, MockTransport};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> sensortag_core::Result<()> {
//! let transport = Arc::new(
//!     MockTransport::new().with_peripheral(MockPeripheral::sensortag("CC2650 SensorTag")),
//! );
//! let config = ConnectionConfig::default().discovery_window(Duration::from_millis(10));
//! let client = GattClient::with_config(transport, config)?;
//!
//! let tag = SensorTag::connect(&client, "cc2650").await?;
//! assert_eq!(tag.read_battery_level().await?.percent(), 87);
//! # Ok(())
//! # }
//! ```

pub mod bluetooth;
pub mod error;
pub mod gatt;
pub mod mock;
pub mod sensortag;
pub mod streaming;
pub mod transport;

pub use bluetooth::BtleplugTransport;
pub use error::{DeviceNotFoundReason, Error, ErrorKind, Result};
pub use gatt::{Characteristic, ConnectionConfig, Device, GattClient, Service, SignalQuality};
pub use sensortag::{DEFAULT_NAME_FILTER, SensorTag};
pub use streaming::{MeasurementStream, NotificationStream, NotifyHandle, ValueStream};
pub use transport::{ObjectPath, Properties, PropertyValue, SharedTransport, Transport};

// Re-export from sensortag-types
pub use sensortag_types::uuid as uuids;
pub use sensortag_types::{
    Barometer, BatteryLevel, EnvironmentSnapshot, Humidity, IrTemperature, Luxometer,
    Measurement, Movement, SensorKind, Vector3,
};
