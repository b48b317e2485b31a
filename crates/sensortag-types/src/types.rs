//! Core types for SensorTag sensor data.

use core::fmt;
use core::str::FromStr;

use bytes::Buf;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::convert;
use crate::error::{ParseError, ParseResult};
use crate::uuid as uuids;

/// Payload size of the IR temperature data characteristic.
pub const IR_TEMPERATURE_BYTES: usize = 4;
/// Payload size of the humidity data characteristic.
pub const HUMIDITY_BYTES: usize = 4;
/// Payload size of the barometer data characteristic.
pub const BAROMETER_BYTES: usize = 6;
/// Payload size of the luxometer data characteristic.
pub const LUXOMETER_BYTES: usize = 2;
/// Payload size of the movement data characteristic.
pub const MOVEMENT_BYTES: usize = 18;
/// Payload size of the battery level characteristic.
pub const BATTERY_BYTES: usize = 1;

/// A sensor on the SensorTag that must be enabled before it produces data.
///
/// This enum is marked `#[non_exhaustive]` so further sensors can be added
/// without breaking downstream matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum SensorKind {
    /// Object and die (ambient) temperature.
    IrTemperature,
    /// Temperature and relative humidity.
    Humidity,
    /// Temperature and barometric pressure.
    Barometer,
    /// Ambient light.
    Luxometer,
    /// Gyroscope, accelerometer and magnetometer.
    Movement,
}

impl SensorKind {
    /// Every sensor, in enable order.
    pub const ALL: [SensorKind; 5] = [
        SensorKind::IrTemperature,
        SensorKind::Humidity,
        SensorKind::Barometer,
        SensorKind::Luxometer,
        SensorKind::Movement,
    ];

    /// Service that owns this sensor's characteristics.
    #[must_use]
    pub fn service_uuid(&self) -> Uuid {
        match self {
            SensorKind::IrTemperature => uuids::IR_TEMPERATURE_SERVICE,
            SensorKind::Humidity => uuids::HUMIDITY_SERVICE,
            SensorKind::Barometer => uuids::BAROMETER_SERVICE,
            SensorKind::Luxometer => uuids::LUXOMETER_SERVICE,
            SensorKind::Movement => uuids::MOVEMENT_SERVICE,
        }
    }

    /// Characteristic carrying the raw measurement.
    #[must_use]
    pub fn data_uuid(&self) -> Uuid {
        match self {
            SensorKind::IrTemperature => uuids::IR_TEMPERATURE_DATA,
            SensorKind::Humidity => uuids::HUMIDITY_DATA,
            SensorKind::Barometer => uuids::BAROMETER_DATA,
            SensorKind::Luxometer => uuids::LUXOMETER_DATA,
            SensorKind::Movement => uuids::MOVEMENT_DATA,
        }
    }

    /// Companion characteristic that switches the sensor on or off.
    #[must_use]
    pub fn config_uuid(&self) -> Uuid {
        match self {
            SensorKind::IrTemperature => uuids::IR_TEMPERATURE_CONFIG,
            SensorKind::Humidity => uuids::HUMIDITY_CONFIG,
            SensorKind::Barometer => uuids::BAROMETER_CONFIG,
            SensorKind::Luxometer => uuids::LUXOMETER_CONFIG,
            SensorKind::Movement => uuids::MOVEMENT_CONFIG,
        }
    }

    /// Bytes written to the config characteristic to start measuring.
    ///
    /// Movement takes a 16-bit mask: the low byte enables all nine axes
    /// and wake-on-motion, the high byte selects the accelerometer range
    /// (0 = ±2 g, which the accelerometer scale assumes).
    #[must_use]
    pub fn enable_payload(&self) -> &'static [u8] {
        match self {
            SensorKind::Movement => &[0xFF, 0x00],
            _ => &[0x01],
        }
    }

    /// Bytes written to the config characteristic to stop measuring.
    #[must_use]
    pub fn disable_payload(&self) -> &'static [u8] {
        match self {
            SensorKind::Movement => &[0x00, 0x00],
            _ => &[0x00],
        }
    }

    /// Minimum payload size of the data characteristic.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self {
            SensorKind::IrTemperature => IR_TEMPERATURE_BYTES,
            SensorKind::Humidity => HUMIDITY_BYTES,
            SensorKind::Barometer => BAROMETER_BYTES,
            SensorKind::Luxometer => LUXOMETER_BYTES,
            SensorKind::Movement => MOVEMENT_BYTES,
        }
    }

    /// Short lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::IrTemperature => "ir-temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::Barometer => "barometer",
            SensorKind::Luxometer => "luxometer",
            SensorKind::Movement => "movement",
        }
    }

    /// Decode a data characteristic payload for this sensor.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if `data` is shorter than
    /// [`payload_len`](Self::payload_len).
    pub fn decode(&self, data: &[u8]) -> ParseResult<Measurement> {
        Ok(match self {
            SensorKind::IrTemperature => {
                Measurement::IrTemperature(IrTemperature::from_bytes(data)?)
            }
            SensorKind::Humidity => Measurement::Humidity(Humidity::from_bytes(data)?),
            SensorKind::Barometer => Measurement::Barometer(Barometer::from_bytes(data)?),
            SensorKind::Luxometer => Measurement::Luxometer(Luxometer::from_bytes(data)?),
            SensorKind::Movement => Measurement::Movement(Movement::from_bytes(data)?),
        })
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = ParseError;

    /// Parse a sensor name, case-insensitively.
    ///
    /// ```
    /// use sensortag_types::SensorKind;
    ///
    /// assert_eq!("Humidity".parse::<SensorKind>(), Ok(SensorKind::Humidity));
    /// assert_eq!("ir_temperature".parse::<SensorKind>(), Ok(SensorKind::IrTemperature));
    /// assert_eq!("lux".parse::<SensorKind>(), Ok(SensorKind::Luxometer));
    /// assert!("gps".parse::<SensorKind>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "ir-temperature" | "irtemperature" | "ir" | "temperature" => {
                Ok(SensorKind::IrTemperature)
            }
            "humidity" => Ok(SensorKind::Humidity),
            "barometer" | "pressure" => Ok(SensorKind::Barometer),
            "luxometer" | "lux" | "light" => Ok(SensorKind::Luxometer),
            "movement" | "motion" | "imu" => Ok(SensorKind::Movement),
            _ => Err(ParseError::UnknownSensor(s.to_string())),
        }
    }
}

/// Object and ambient temperature from the IR thermopile.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IrTemperature {
    /// Object (target) temperature in °C.
    pub object: f64,
    /// Ambient (die) temperature in °C.
    pub ambient: f64,
}

impl IrTemperature {
    /// Decode from the IR temperature data characteristic.
    ///
    /// The byte format is:
    /// - bytes 0-1: object temperature (u16 LE)
    /// - bytes 2-3: ambient temperature (u16 LE)
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if `data` contains fewer
    /// than [`IR_TEMPERATURE_BYTES`] bytes.
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        ParseError::check_len(data, IR_TEMPERATURE_BYTES)?;
        let mut buf = data;
        let object = convert::ir_temperature(buf.get_u16_le());
        let ambient = convert::ir_temperature(buf.get_u16_le());
        Ok(Self { object, ambient })
    }
}

/// Temperature and relative humidity from the HDC1000.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Humidity {
    /// Temperature in °C.
    pub temperature: f64,
    /// Relative humidity in %.
    pub humidity: f64,
}

impl Humidity {
    /// Decode from the humidity data characteristic.
    ///
    /// The byte format is:
    /// - bytes 0-1: temperature (u16 LE)
    /// - bytes 2-3: humidity (u16 LE)
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if `data` contains fewer
    /// than [`HUMIDITY_BYTES`] bytes.
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        ParseError::check_len(data, HUMIDITY_BYTES)?;
        let mut buf = data;
        let temperature = convert::humidity_temperature(buf.get_u16_le());
        let humidity = convert::relative_humidity(buf.get_u16_le());
        Ok(Self {
            temperature,
            humidity,
        })
    }
}

/// Temperature and pressure from the BMP280.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Barometer {
    /// Temperature in °C.
    pub temperature: f64,
    /// Barometric pressure in hPa.
    pub pressure: f64,
}

impl Barometer {
    /// Decode from the barometer data characteristic.
    ///
    /// The byte format is:
    /// - bytes 0-2: temperature (u24 LE, hundredths of °C)
    /// - bytes 3-5: pressure (u24 LE, hundredths of hPa)
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if `data` contains fewer
    /// than [`BAROMETER_BYTES`] bytes.
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        ParseError::check_len(data, BAROMETER_BYTES)?;
        let mut buf = data;
        let temperature = convert::barometer(buf.get_uint_le(3) as u32);
        let pressure = convert::barometer(buf.get_uint_le(3) as u32);
        Ok(Self {
            temperature,
            pressure,
        })
    }
}

/// Illuminance from the OPT3001.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Luxometer {
    /// Illuminance in lux.
    pub lux: f64,
}

impl Luxometer {
    /// Decode from the luxometer data characteristic (u16 LE).
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if `data` contains fewer
    /// than [`LUXOMETER_BYTES`] bytes.
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        ParseError::check_len(data, LUXOMETER_BYTES)?;
        let mut buf = data;
        Ok(Self {
            lux: convert::lux(buf.get_u16_le()),
        })
    }
}

/// A three-axis reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vector3 {
    /// X axis component
    pub x: f64,
    /// Y axis component
    pub y: f64,
    /// Z axis component
    pub z: f64,
}

impl Vector3 {
    fn read(buf: &mut &[u8], scale: fn(u16) -> f64) -> Self {
        Self {
            x: scale(buf.get_u16_le()),
            y: scale(buf.get_u16_le()),
            z: scale(buf.get_u16_le()),
        }
    }

    /// Euclidean length.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {:.2} {:.2}", self.x, self.y, self.z)
    }
}

/// Nine-axis motion sample from the MPU9250.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Movement {
    /// Angular rate in °/s.
    pub gyro: Vector3,
    /// Acceleration in g.
    pub accel: Vector3,
    /// Magnetic field in µT.
    pub mag: Vector3,
}

impl Movement {
    /// Decode from the movement data characteristic.
    ///
    /// The byte format is nine i16 LE fields: gyro x/y/z, accel x/y/z,
    /// mag x/y/z.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if `data` contains fewer
    /// than [`MOVEMENT_BYTES`] bytes.
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        ParseError::check_len(data, MOVEMENT_BYTES)?;
        let mut buf = data;
        let gyro = Vector3::read(&mut buf, convert::gyro);
        let accel = Vector3::read(&mut buf, convert::accel);
        let mag = Vector3::read(&mut buf, convert::mag);
        Ok(Self { gyro, accel, mag })
    }
}

/// Battery charge in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BatteryLevel(pub u8);

impl BatteryLevel {
    /// Decode from the standard battery level characteristic.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] on an empty payload.
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        ParseError::check_len(data, BATTERY_BYTES)?;
        Ok(Self(data[0]))
    }

    /// The percentage value.
    pub fn percent(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// A decoded reading from any sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "sensor", rename_all = "snake_case"))]
#[non_exhaustive]
pub enum Measurement {
    IrTemperature(IrTemperature),
    Humidity(Humidity),
    Barometer(Barometer),
    Luxometer(Luxometer),
    Movement(Movement),
}

impl Measurement {
    /// The sensor this measurement came from.
    pub fn kind(&self) -> SensorKind {
        match self {
            Measurement::IrTemperature(_) => SensorKind::IrTemperature,
            Measurement::Humidity(_) => SensorKind::Humidity,
            Measurement::Barometer(_) => SensorKind::Barometer,
            Measurement::Luxometer(_) => SensorKind::Luxometer,
            Measurement::Movement(_) => SensorKind::Movement,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measurement::IrTemperature(t) => {
                write!(f, "amb: {:.2} °C obj: {:.2} °C", t.ambient, t.object)
            }
            Measurement::Humidity(h) => {
                write!(f, "temp: {:.2} °C hum: {:.2} %", h.temperature, h.humidity)
            }
            Measurement::Barometer(b) => {
                write!(f, "temp: {:.2} °C press: {:.2} hPa", b.temperature, b.pressure)
            }
            Measurement::Luxometer(l) => write!(f, "lux: {:.2}", l.lux),
            Measurement::Movement(m) => {
                write!(f, "gyro: {} acc: {} mag: {}", m.gyro, m.accel, m.mag)
            }
        }
    }
}

macro_rules! impl_from_measurement {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Measurement {
                fn from(value: $variant) -> Self {
                    Measurement::$variant(value)
                }
            }

            impl TryFrom<Measurement> for $variant {
                type Error = ParseError;

                fn try_from(value: Measurement) -> Result<Self, Self::Error> {
                    match value {
                        Measurement::$variant(inner) => Ok(inner),
                        other => Err(ParseError::InvalidValue(format!(
                            "expected {} measurement, got {}",
                            stringify!($variant),
                            other.kind()
                        ))),
                    }
                }
            }
        )*
    };
}

impl_from_measurement!(IrTemperature, Humidity, Barometer, Luxometer, Movement);

/// Environmental readings captured together, ready for publishing.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnvironmentSnapshot {
    /// Ambient (die) temperature from the IR sensor, °C.
    pub ambient: f64,
    /// Object temperature from the IR sensor, °C.
    pub object: f64,
    /// Relative humidity, %.
    pub humidity: f64,
    /// Barometric pressure, hPa.
    pub pressure: f64,
    /// Illuminance, lux.
    pub lux: f64,
    /// When the last of the readings completed.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub captured_at: OffsetDateTime,
}

impl EnvironmentSnapshot {
    /// Assemble a snapshot from individual sensor readings.
    pub fn new(
        ir: IrTemperature,
        humidity: Humidity,
        barometer: Barometer,
        luxometer: Luxometer,
        captured_at: OffsetDateTime,
    ) -> Self {
        Self {
            ambient: ir.ambient,
            object: ir.object,
            humidity: humidity.humidity,
            pressure: barometer.pressure,
            lux: luxometer.lux,
            captured_at,
        }
    }
}
