//! Transport abstraction over the system Bluetooth stack.
//!
//! The GATT client never talks to a Bluetooth API directly. It walks an
//! object tree exposed by a [`Transport`]: the adapter at the root, discovered
//! devices below it, then services, then characteristics. Every node is
//! addressed by an [`ObjectPath`] and described by a string-keyed
//! [`Properties`] bag, mirroring the BlueZ D-Bus model.
//!
//! Two implementations ship with the crate:
//!
//! - [`BtleplugTransport`](crate::bluetooth::BtleplugTransport) for real hardware
//! - [`MockTransport`](crate::mock::MockTransport) for tests and demos

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;

/// Property keys every transport must provide.
pub mod property {
    /// Device advertised name.
    pub const NAME: &str = "Name";
    /// Device hardware address.
    pub const ADDRESS: &str = "Address";
    /// Device signal strength (dBm) from the last advertisement.
    pub const RSSI: &str = "RSSI";
    /// Device link state.
    pub const CONNECTED: &str = "Connected";
    /// Device GATT tree is fully enumerable.
    pub const SERVICES_RESOLVED: &str = "ServicesResolved";
    /// Service or characteristic UUID.
    pub const UUID: &str = "UUID";
    /// Whether a service is primary.
    pub const PRIMARY: &str = "Primary";
    /// Characteristic capability flags ("read", "write", "notify", ...).
    pub const FLAGS: &str = "Flags";
    /// Whether notifications are active on a characteristic.
    pub const NOTIFYING: &str = "Notifying";
}

/// Address of a node in the transport's object tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Create a path from its string form.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of a direct child node.
    pub fn child(&self, segment: &str) -> Self {
        Self(format!("{}/{}", self.0.trim_end_matches('/'), segment))
    }

    /// Path of the parent node, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let idx = self.0.rfind('/')?;
        if idx == 0 {
            return None;
        }
        Some(Self(self.0[..idx].to_string()))
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    List(Vec<String>),
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// UUID values, also accepting the canonical string form.
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            PropertyValue::Uuid(u) => Some(*u),
            PropertyValue::Str(s) => Uuid::parse_str(s).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::List(l) => Some(l),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i16> for PropertyValue {
    fn from(value: i16) -> Self {
        PropertyValue::Int(i64::from(value))
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<Uuid> for PropertyValue {
    fn from(value: Uuid) -> Self {
        PropertyValue::Uuid(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::List(value)
    }
}

/// Property bag of one object, keyed by property name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(HashMap<String, PropertyValue>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn name(&self) -> Option<&str> {
        self.get(property::NAME).and_then(PropertyValue::as_str)
    }

    pub fn address(&self) -> Option<&str> {
        self.get(property::ADDRESS).and_then(PropertyValue::as_str)
    }

    /// Signal strength, if the device has advertised recently.
    pub fn rssi(&self) -> Option<i16> {
        self.get(property::RSSI)
            .and_then(PropertyValue::as_i64)
            .and_then(|v| i16::try_from(v).ok())
    }

    pub fn connected(&self) -> bool {
        self.get(property::CONNECTED)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }

    /// Absent is treated as not yet resolved.
    pub fn services_resolved(&self) -> bool {
        self.get(property::SERVICES_RESOLVED)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.get(property::UUID).and_then(PropertyValue::as_uuid)
    }

    pub fn flags(&self) -> Vec<String> {
        self.get(property::FLAGS)
            .and_then(PropertyValue::as_list)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Receiving half of a characteristic's value-changed events.
///
/// The channel closes when notifications are stopped or a newer
/// subscription replaces this one.
pub type ValueReceiver = mpsc::Receiver<Vec<u8>>;

/// Capacity of the channel a transport hands out from
/// [`Transport::start_notify`].
pub const NOTIFY_CHANNEL_CAPACITY: usize = 32;

/// Primitive operations the GATT client needs from a Bluetooth stack.
///
/// Implementations must be cheap to share; the client holds them as
/// [`SharedTransport`].
///
/// # Example
///
/// ```ignore
/// use sensortag_core::transport::{Transport, ObjectPath};
///
/// async fn count_devices<T: Transport>(transport: &T) -> sensortag_core::Result<usize> {
///     Ok(transport.children(&transport.adapter()).await?.len())
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    // --- Adapter ---

    /// Path of the local adapter, root of the object tree.
    fn adapter(&self) -> ObjectPath;

    /// Begin scanning for advertising peripherals.
    async fn start_discovery(&self) -> Result<()>;

    /// Stop scanning.
    async fn stop_discovery(&self) -> Result<()>;

    // --- Object tree ---

    /// Direct children of a node, in a stable order.
    async fn children(&self, path: &ObjectPath) -> Result<Vec<ObjectPath>>;

    /// Current property bag of a node.
    async fn properties(&self, path: &ObjectPath) -> Result<Properties>;

    // --- Device lifecycle ---

    /// Request a connection. Service resolution completes asynchronously
    /// and is reported through the `ServicesResolved` property.
    async fn connect(&self, device: &ObjectPath) -> Result<()>;

    /// Request a disconnect without waiting for confirmation.
    async fn disconnect(&self, device: &ObjectPath) -> Result<()>;

    // --- Characteristic I/O ---

    /// Read the current value.
    async fn read_value(&self, characteristic: &ObjectPath) -> Result<Vec<u8>>;

    /// Write a value, waiting for the peripheral's response.
    async fn write_value(&self, characteristic: &ObjectPath, value: &[u8]) -> Result<()>;

    /// Enable notifications; each value change is delivered on the
    /// returned channel. Replaces any earlier subscription on the same
    /// characteristic.
    async fn start_notify(&self, characteristic: &ObjectPath) -> Result<ValueReceiver>;

    /// Disable notifications and close the delivery channel.
    async fn stop_notify(&self, characteristic: &ObjectPath) -> Result<()>;
}

/// Shared handle to a transport.
pub type SharedTransport = Arc<dyn Transport>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_navigation() {
        let adapter = ObjectPath::new("/org/bluez/hci0");
        let device = adapter.child("dev_B0_B4_48_C0_5D_00");
        assert_eq!(device.as_str(), "/org/bluez/hci0/dev_B0_B4_48_C0_5D_00");
        assert_eq!(device.parent(), Some(adapter.clone()));
        assert_eq!(device.name(), "dev_B0_B4_48_C0_5D_00");
        assert_eq!(ObjectPath::new("/hci0").parent(), None);
    }

    #[test]
    fn test_properties_accessors() {
        let uuid = sensortag_types::uuid::BATTERY_SERVICE;
        let props = Properties::new()
            .with(property::NAME, "SensorTag")
            .with(property::ADDRESS, "B0:B4:48:C0:5D:00")
            .with(property::RSSI, -60i16)
            .with(property::SERVICES_RESOLVED, true)
            .with(property::UUID, uuid)
            .with(property::FLAGS, vec!["read".to_string(), "notify".to_string()]);

        assert_eq!(props.name(), Some("SensorTag"));
        assert_eq!(props.address(), Some("B0:B4:48:C0:5D:00"));
        assert_eq!(props.rssi(), Some(-60));
        assert!(props.services_resolved());
        assert!(!props.connected());
        assert_eq!(props.uuid(), Some(uuid));
        assert_eq!(props.flags(), vec!["read", "notify"]);
        assert_eq!(props.len(), 6);
    }

    #[test]
    fn test_uuid_from_string_property() {
        let props = Properties::new().with(property::UUID, "0000180f-0000-1000-8000-00805f9b34fb");
        assert_eq!(props.uuid(), Some(sensortag_types::uuid::BATTERY_SERVICE));

        let props = Properties::new().with(property::UUID, "not-a-uuid");
        assert_eq!(props.uuid(), None);
    }

    #[test]
    fn test_missing_properties_default() {
        let props = Properties::new();
        assert!(props.is_empty());
        assert_eq!(props.name(), None);
        assert_eq!(props.rssi(), None);
        assert!(!props.services_resolved());
        assert!(props.flags().is_empty());
    }
}
