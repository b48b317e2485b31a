//! Error types for sensortag-core.
//!
//! Every failure propagates to the immediate caller; nothing in this crate
//! retries on its own. [`Error::kind`] groups the variants into the coarse
//! categories callers usually branch on:
//!
//! | Kind | Variants | Typical cause |
//! |------|----------|---------------|
//! | [`ErrorKind::NotFound`] | `DeviceNotFound`, `ServiceNotFound`, `CharacteristicNotFound` | Peripheral out of range, wrong name, firmware without the service |
//! | [`ErrorKind::Transport`] | `Bluetooth`, `Transport`, `ObjectNotFound`, `MissingProperty`, `NotConnected`, `Timeout`, `Io` | Link dropped, object vanished from the tree, malformed response |
//! | [`ErrorKind::ResolutionTimeout`] | `ResolutionTimeout` | GATT tree never resolved after connect |
//! | [`ErrorKind::InvalidData`] | `InvalidReadingFormat`, `InvalidData` | Short or malformed characteristic payload |
//! | [`ErrorKind::Config`] | `InvalidConfig` | Bad [`ConnectionConfig`](crate::ConnectionConfig) values |
//! | [`ErrorKind::Cancelled`] | `Cancelled` | Subscription closed while waiting |

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::transport::ObjectPath;

/// Errors that can occur when talking to a SensorTag.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error from the platform stack.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Transport-level failure not covered by a more specific variant.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport no longer knows the addressed object.
    #[error("Object not found: {path}")]
    ObjectNotFound {
        /// Path of the missing object.
        path: ObjectPath,
    },

    /// An object's property bag lacks a required key.
    #[error("Property '{property}' missing on {path}")]
    MissingProperty {
        /// Path of the object that was queried.
        path: ObjectPath,
        /// Name of the missing property.
        property: &'static str,
    },

    /// Device not found during discovery.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// Service UUID not present on the device.
    #[error("Service not found: {uuid} (searched {service_count} services)")]
    ServiceNotFound {
        /// The UUID that was not found.
        uuid: Uuid,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// Characteristic UUID not present in the service.
    #[error(
        "Characteristic not found: {uuid} in service {service} (searched {characteristic_count} characteristics)"
    )]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: Uuid,
        /// The service that was searched.
        service: Uuid,
        /// Number of characteristics that were searched.
        characteristic_count: usize,
    },

    /// The GATT tree did not resolve within the configured bound.
    #[error("Services of {device} not resolved after {duration:?} ({polls} polls)")]
    ResolutionTimeout {
        /// Device name or address.
        device: String,
        /// The configured bound.
        duration: Duration,
        /// Number of property polls performed.
        polls: u32,
    },

    /// Operation attempted while not connected to device.
    #[error("Not connected to device")]
    NotConnected,

    /// Characteristic payload shorter than its layout.
    #[error("Invalid reading format: expected {expected} bytes, got {actual}")]
    InvalidReadingFormat {
        /// Expected data size.
        expected: usize,
        /// Actual data size received.
        actual: usize,
    },

    /// Failed to interpret data received from device.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse error category, see the module docs for the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Transport,
    ResolutionTimeout,
    InvalidData,
    Config,
    Cancelled,
}

/// Reason why a device was not found.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// Discovery completed without any usable candidate.
    NoDevicesInRange,
    /// No candidate's name contains the filter.
    NotFound { identifier: String },
    /// No Bluetooth adapter available.
    NoAdapter,
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDevicesInRange => write!(f, "no devices in range"),
            Self::NotFound { identifier } => write!(f, "device '{}' not found", identifier),
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
        }
    }
}

impl Error {
    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            identifier: identifier.into(),
        })
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a generic transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create an object-not-found error.
    pub fn object_not_found(path: &ObjectPath) -> Self {
        Self::ObjectNotFound { path: path.clone() }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DeviceNotFound(_)
            | Error::ServiceNotFound { .. }
            | Error::CharacteristicNotFound { .. } => ErrorKind::NotFound,
            Error::ResolutionTimeout { .. } => ErrorKind::ResolutionTimeout,
            Error::InvalidReadingFormat { .. } | Error::InvalidData(_) => ErrorKind::InvalidData,
            Error::InvalidConfig(_) => ErrorKind::Config,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Bluetooth(_)
            | Error::Transport(_)
            | Error::ObjectNotFound { .. }
            | Error::MissingProperty { .. }
            | Error::NotConnected
            | Error::Timeout { .. }
            | Error::Io(_) => ErrorKind::Transport,
        }
    }

    /// Whether this is a lookup failure (device, service or characteristic).
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Whether the underlying link or bus operation failed.
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}

impl From<sensortag_types::ParseError> for Error {
    fn from(err: sensortag_types::ParseError) -> Self {
        match err {
            sensortag_types::ParseError::InsufficientBytes { expected, actual } => {
                Error::InvalidReadingFormat { expected, actual }
            }
            sensortag_types::ParseError::InvalidValue(msg) => Error::InvalidData(msg),
            // Handle future ParseError variants (non_exhaustive)
            _ => Error::InvalidData(format!("Parse error: {}", err)),
        }
    }
}

/// Result type alias using sensortag-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use sensortag_types::ParseError;

    #[test]
    fn test_error_display() {
        let err = Error::device_not_found("CC2650");
        assert!(err.to_string().contains("CC2650"));

        let err = Error::NotConnected;
        assert_eq!(err.to_string(), "Not connected to device");

        let err = Error::ServiceNotFound {
            uuid: sensortag_types::uuid::HUMIDITY_SERVICE,
            service_count: 3,
        };
        assert!(err.to_string().contains("f000aa20"));
        assert!(err.to_string().contains("3 services"));

        let err = Error::timeout("read", Duration::from_secs(10));
        assert!(err.to_string().contains("read"));
        assert!(err.to_string().contains("10s"));
    }

    #[test]
    fn test_resolution_timeout_display() {
        let err = Error::ResolutionTimeout {
            device: "SensorTag".into(),
            duration: Duration::from_secs(5),
            polls: 50,
        };
        let msg = err.to_string();
        assert!(msg.contains("SensorTag"));
        assert!(msg.contains("5s"));
        assert!(msg.contains("50 polls"));
        assert_eq!(err.kind(), ErrorKind::ResolutionTimeout);
    }

    #[test]
    fn test_error_kinds() {
        assert!(Error::device_not_found("x").is_not_found());
        assert!(
            Error::CharacteristicNotFound {
                uuid: Uuid::nil(),
                service: Uuid::nil(),
                characteristic_count: 0,
            }
            .is_not_found()
        );
        assert!(Error::NotConnected.is_transport());
        assert!(Error::transport("link down").is_transport());
        assert!(Error::object_not_found(&ObjectPath::new("/org/bluez/hci0/dev_X")).is_transport());
        assert_eq!(Error::invalid_config("bad").kind(), ErrorKind::Config);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_device_not_found_reasons() {
        let err = Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter);
        assert!(err.to_string().contains("no Bluetooth adapter"));

        let err = Error::DeviceNotFound(DeviceNotFoundReason::NoDevicesInRange);
        assert!(err.to_string().contains("no devices in range"));
    }

    #[test]
    fn test_parse_error_conversion() {
        let err: Error = ParseError::InsufficientBytes {
            expected: 18,
            actual: 4,
        }
        .into();
        assert!(matches!(
            err,
            Error::InvalidReadingFormat {
                expected: 18,
                actual: 4
            }
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidData);

        let err: Error = ParseError::UnknownSensor("gps".into()).into();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }
}
