//! Platform-agnostic types for the TI SensorTag CC2650.
//!
//! This crate holds everything about the peripheral that does not need a
//! Bluetooth stack: the GATT UUID table, the sensor catalogue with its enable
//! protocol, and the decoders that turn characteristic payloads into
//! calibrated measurements.
//!
//! # Example
//!
//! ```
//! use sensortag_types::{Measurement, SensorKind};
//!
//! // Raw bytes as delivered by the luxometer data characteristic.
//! let reading = SensorKind::Luxometer.decode(&[0x64, 0x10]).unwrap();
//! if let Measurement::Luxometer(l) = reading {
//!     assert!((l.lux - 2.0).abs() < 1e-9);
//! }
//! ```

pub mod convert;
pub mod error;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use types::{
    Barometer, BatteryLevel, EnvironmentSnapshot, Humidity, IrTemperature, Luxometer,
    Measurement, Movement, SensorKind, Vector3,
};
pub use crate::uuid as uuids;
