//! Bluetooth UUIDs for the SensorTag CC2650.
//!
//! Service and characteristic identifiers must match the peripheral firmware
//! exactly. Vendor UUIDs share the `f000xxxx-0451-4000-b000-000000000000` base;
//! standard services use the Bluetooth SIG base.

use uuid::{Uuid, uuid};

// --- Sensor services ---

/// IR temperature (TMP007) service.
pub const IR_TEMPERATURE_SERVICE: Uuid = uuid!("f000aa00-0451-4000-b000-000000000000");

/// Humidity (HDC1000) service.
pub const HUMIDITY_SERVICE: Uuid = uuid!("f000aa20-0451-4000-b000-000000000000");

/// Barometer (BMP280) service.
pub const BAROMETER_SERVICE: Uuid = uuid!("f000aa40-0451-4000-b000-000000000000");

/// IO service (LEDs and buzzer).
pub const IO_SERVICE: Uuid = uuid!("f000aa64-0451-4000-b000-000000000000");

/// Luxometer (OPT3001) service.
pub const LUXOMETER_SERVICE: Uuid = uuid!("f000aa70-0451-4000-b000-000000000000");

/// Movement (MPU9250) service.
pub const MOVEMENT_SERVICE: Uuid = uuid!("f000aa80-0451-4000-b000-000000000000");

/// Register service.
pub const REGISTER_SERVICE: Uuid = uuid!("f000ac00-0451-4000-b000-000000000000");

/// Connection control service.
pub const CONNECTION_CONTROL_SERVICE: Uuid = uuid!("f000ccc0-0451-4000-b000-000000000000");

/// Over-the-air download service.
pub const OAD_SERVICE: Uuid = uuid!("f000ffc0-0451-4000-b000-000000000000");

/// Simple keys service.
pub const SIMPLE_KEYS_SERVICE: Uuid = uuid!("0000ffe0-0000-1000-8000-00805f9b34fb");

// --- Sensor characteristics ---

/// IR temperature data.
pub const IR_TEMPERATURE_DATA: Uuid = uuid!("f000aa01-0451-4000-b000-000000000000");

/// IR temperature enable/config.
pub const IR_TEMPERATURE_CONFIG: Uuid = uuid!("f000aa02-0451-4000-b000-000000000000");

/// Humidity data.
pub const HUMIDITY_DATA: Uuid = uuid!("f000aa21-0451-4000-b000-000000000000");

/// Humidity enable/config.
pub const HUMIDITY_CONFIG: Uuid = uuid!("f000aa22-0451-4000-b000-000000000000");

/// Barometer data.
pub const BAROMETER_DATA: Uuid = uuid!("f000aa41-0451-4000-b000-000000000000");

/// Barometer enable/config.
pub const BAROMETER_CONFIG: Uuid = uuid!("f000aa42-0451-4000-b000-000000000000");

/// IO data.
pub const IO_DATA: Uuid = uuid!("f000aa65-0451-4000-b000-000000000000");

/// IO config.
pub const IO_CONFIG: Uuid = uuid!("f000aa66-0451-4000-b000-000000000000");

/// Luxometer data.
pub const LUXOMETER_DATA: Uuid = uuid!("f000aa71-0451-4000-b000-000000000000");

/// Luxometer enable/config.
pub const LUXOMETER_CONFIG: Uuid = uuid!("f000aa72-0451-4000-b000-000000000000");

/// Movement data (gyroscope, accelerometer, magnetometer).
pub const MOVEMENT_DATA: Uuid = uuid!("f000aa81-0451-4000-b000-000000000000");

/// Movement enable/config (axis bitmask plus accelerometer range).
pub const MOVEMENT_CONFIG: Uuid = uuid!("f000aa82-0451-4000-b000-000000000000");

// --- Standard BLE services ---

/// Generic Attribute service.
pub const GENERIC_ATTRIBUTE_SERVICE: Uuid = uuid!("00001801-0000-1000-8000-00805f9b34fb");

/// Device Information service.
pub const DEVICE_INFO_SERVICE: Uuid = uuid!("0000180a-0000-1000-8000-00805f9b34fb");

/// Battery service.
pub const BATTERY_SERVICE: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");

/// Battery level characteristic.
pub const BATTERY_LEVEL: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");

/// Human-readable label for a known UUID, used when dumping a GATT tree.
pub fn describe(uuid: &Uuid) -> Option<&'static str> {
    let label = match *uuid {
        IR_TEMPERATURE_SERVICE => "IR Temperature Service",
        HUMIDITY_SERVICE => "Humidity Service",
        BAROMETER_SERVICE => "Barometer Service",
        IO_SERVICE => "IO Service",
        LUXOMETER_SERVICE => "Luxometer Service",
        MOVEMENT_SERVICE => "Movement Service",
        REGISTER_SERVICE => "Register Service",
        CONNECTION_CONTROL_SERVICE => "Connection Control Service",
        OAD_SERVICE => "OAD Service",
        SIMPLE_KEYS_SERVICE => "Simple Keys Service",
        IR_TEMPERATURE_DATA => "IR Temperature Data",
        IR_TEMPERATURE_CONFIG => "IR Temperature Config",
        HUMIDITY_DATA => "Humidity Data",
        HUMIDITY_CONFIG => "Humidity Config",
        BAROMETER_DATA => "Barometer Data",
        BAROMETER_CONFIG => "Barometer Config",
        IO_DATA => "IO Data",
        IO_CONFIG => "IO Config",
        LUXOMETER_DATA => "Luxometer Data",
        LUXOMETER_CONFIG => "Luxometer Config",
        MOVEMENT_DATA => "Movement Data",
        MOVEMENT_CONFIG => "Movement Config",
        GENERIC_ATTRIBUTE_SERVICE => "Generic Attribute Service",
        DEVICE_INFO_SERVICE => "Device Information Service",
        BATTERY_SERVICE => "Battery Service",
        BATTERY_LEVEL => "Battery Level",
        _ => return None,
    };
    Some(label)
}
