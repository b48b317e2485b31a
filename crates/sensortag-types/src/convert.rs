//! Raw-to-physical conversions for SensorTag sensor fields.
//!
//! Each function takes one raw field as it appears in a characteristic
//! payload (already assembled from little-endian bytes) and returns the
//! calibrated value. Payload slicing lives on the measurement types in
//! [`crate::types`].

/// Resolution of one TMP007 LSB after dropping the two status bits.
pub const IR_TEMPERATURE_SCALE_LSB: f64 = 0.03125;

/// Gyroscope counts per °/s (±250 °/s range).
pub const GYRO_SCALE: f64 = 128.0;

/// Accelerometer counts per g (±2 g range).
pub const ACCEL_SCALE: f64 = 16384.0;

/// Magnetometer µT per count.
pub const MAG_SCALE: f64 = 4912.0 / 32768.0;

/// IR temperature field to °C.
///
/// ```
/// use sensortag_types::convert::ir_temperature;
///
/// assert_eq!(ir_temperature(0x0C80), 25.0);
/// ```
pub fn ir_temperature(raw: u16) -> f64 {
    f64::from(raw >> 2) * IR_TEMPERATURE_SCALE_LSB
}

/// HDC1000 temperature field to °C.
pub fn humidity_temperature(raw: u16) -> f64 {
    (f64::from(raw) / 65536.0) * 165.0 - 40.0
}

/// HDC1000 humidity field to %RH.
pub fn relative_humidity(raw: u16) -> f64 {
    (f64::from(raw) / 65536.0) * 100.0
}

/// BMP280 24-bit field to °C or hPa (both use hundredths).
pub fn barometer(raw: u32) -> f64 {
    f64::from(raw) / 100.0
}

/// OPT3001 result register to lux.
///
/// The low 12 bits are the mantissa, the high 4 bits the exponent; each
/// exponent step doubles the LSB weight of 0.01 lux.
///
/// ```
/// use sensortag_types::convert::lux;
///
/// assert!((lux(0x1064) - 2.0).abs() < 1e-9); // m = 100, e = 1
/// ```
pub fn lux(raw: u16) -> f64 {
    let mantissa = raw & 0x0FFF;
    let exponent = (raw & 0xF000) >> 12;
    let factor = if exponent == 0 { 1u32 } else { 2u32 << (exponent - 1) };
    f64::from(mantissa) * (0.01 * f64::from(factor))
}

/// Signed movement count with the two low bits dropped.
///
/// The field is a two's-complement `i16`; the shift is arithmetic.
pub fn movement_counts(raw: u16) -> f64 {
    f64::from((raw as i16) >> 2)
}

/// Gyroscope field to °/s.
pub fn gyro(raw: u16) -> f64 {
    movement_counts(raw) / GYRO_SCALE
}

/// Accelerometer field to g.
pub fn accel(raw: u16) -> f64 {
    movement_counts(raw) / ACCEL_SCALE
}

/// Magnetometer field to µT.
pub fn mag(raw: u16) -> f64 {
    movement_counts(raw) * MAG_SCALE
}
