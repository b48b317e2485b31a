//! In-memory transport for testing.
//!
//! [`MockTransport`] simulates a BlueZ-style object tree without any
//! Bluetooth hardware. Peripherals are described with [`MockPeripheral`],
//! [`MockService`] and [`MockCharacteristic`] builders and exposed under
//! `/org/bluez/hci0/dev_XX_XX_XX_XX_XX_XX/serviceNNNN/charNNNN`.
//!
//! # Features
//!
//! - **Deferred resolution**: `ServicesResolved` stays false for a configurable
//!   number of property polls after connect, or forever
//! - **Sensor gating**: data characteristics read as zeros until their
//!   configuration characteristic is written with a non-zero payload
//! - **Failure injection**: every fallible operation except the cleanup paths
//!   (`stop_discovery`, `disconnect`, `stop_notify`) can be made to fail
//! - **Recording**: scan bracketing, property polls and writes are counted
//!   for assertions
//! - **Notifications**: [`MockTransport::notify`] pushes a value to the
//!   active subscriber, one per characteristic

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use sensortag_types::SensorKind;
use sensortag_types::uuid as uuids;

use crate::error::{Error, Result};
use crate::transport::{
    NOTIFY_CHANNEL_CAPACITY, ObjectPath, Properties, Transport, ValueReceiver, property,
};

/// Raw payloads a healthy CC2650 reports once its sensors are enabled.
pub mod samples {
    /// Object 25.0 °C, ambient 20.0 °C.
    pub const IR_TEMPERATURE: [u8; 4] = [0x80, 0x0C, 0x00, 0x0A];
    /// 21.875 °C, 50 %RH.
    pub const HUMIDITY: [u8; 4] = [0x00, 0x60, 0x00, 0x80];
    /// 21.50 °C, 1013.25 hPa.
    pub const BAROMETER: [u8; 6] = [0x66, 0x08, 0x00, 0xCD, 0x8B, 0x01];
    /// 16.0 lux.
    pub const LUXOMETER: [u8; 2] = [0x64, 0x40];
    /// Gyro x 1.0 °/s, accel z 0.25 g, magnetometer at rest.
    pub const MOVEMENT: [u8; 18] = [
        0x00, 0x02, 0x00, 0x00, 0x00, 0x00, // gyro
        0x00, 0x00, 0x00, 0x00, 0x00, 0x40, // accel
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // mag
    ];
    /// 87 %.
    pub const BATTERY_LEVEL: [u8; 1] = [87];

    /// Sample payload for a sensor.
    pub fn for_sensor(kind: sensortag_types::SensorKind) -> &'static [u8] {
        use sensortag_types::SensorKind;
        match kind {
            SensorKind::IrTemperature => &IR_TEMPERATURE,
            SensorKind::Humidity => &HUMIDITY,
            SensorKind::Barometer => &BAROMETER,
            SensorKind::Luxometer => &LUXOMETER,
            SensorKind::Movement => &MOVEMENT,
        }
    }
}

/// A simulated characteristic.
#[derive(Debug, Clone)]
pub struct MockCharacteristic {
    uuid: Uuid,
    value: Vec<u8>,
    flags: Vec<String>,
    gated_by: Option<Uuid>,
}

impl MockCharacteristic {
    /// Readable characteristic with an empty value.
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            value: Vec::new(),
            flags: vec!["read".to_string()],
            gated_by: None,
        }
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = value.into();
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: &[&str]) -> Self {
        self.flags = flags.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Read as zeros until the sibling characteristic `config` holds a
    /// non-zero value.
    #[must_use]
    pub fn gated_by(mut self, config: Uuid) -> Self {
        self.gated_by = Some(config);
        self
    }
}

/// A simulated primary service.
#[derive(Debug, Clone)]
pub struct MockService {
    uuid: Uuid,
    characteristics: Vec<MockCharacteristic>,
}

impl MockService {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            characteristics: Vec::new(),
        }
    }

    #[must_use]
    pub fn characteristic(mut self, characteristic: MockCharacteristic) -> Self {
        self.characteristics.push(characteristic);
        self
    }

    /// A SensorTag sensor service: gated data plus a disabled config
    /// characteristic.
    pub fn sensor(kind: SensorKind, data: &[u8]) -> Self {
        Self::new(kind.service_uuid())
            .characteristic(
                MockCharacteristic::new(kind.data_uuid())
                    .value(data)
                    .flags(&["read", "notify"])
                    .gated_by(kind.config_uuid()),
            )
            .characteristic(
                MockCharacteristic::new(kind.config_uuid())
                    .value(vec![0u8; kind.disable_payload().len()])
                    .flags(&["read", "write"]),
            )
    }

    /// The standard Battery Service.
    pub fn battery(level: u8) -> Self {
        Self::new(uuids::BATTERY_SERVICE).characteristic(
            MockCharacteristic::new(uuids::BATTERY_LEVEL)
                .value([level])
                .flags(&["read", "notify"]),
        )
    }
}

/// A simulated peripheral.
#[derive(Debug, Clone)]
pub struct MockPeripheral {
    name: Option<String>,
    address: String,
    rssi: Option<i16>,
    services: Vec<MockService>,
    resolve_after_polls: Option<u32>,
}

impl MockPeripheral {
    /// A named peripheral with a random address and no services.
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::anonymous()
        }
    }

    /// A peripheral that advertises no name.
    pub fn anonymous() -> Self {
        Self {
            name: None,
            address: format!(
                "B0:B4:48:{:02X}:{:02X}:{:02X}",
                rand::random::<u8>(),
                rand::random::<u8>(),
                rand::random::<u8>()
            ),
            rssi: Some(-60),
            services: Vec::new(),
            resolve_after_polls: Some(0),
        }
    }

    /// A CC2650 with every sensor service, battery and device information.
    pub fn sensortag(name: &str) -> Self {
        let mut peripheral = Self::new(name)
            .service(MockService::new(uuids::GENERIC_ATTRIBUTE_SERVICE))
            .service(MockService::new(uuids::DEVICE_INFO_SERVICE));
        for kind in SensorKind::ALL {
            peripheral = peripheral.service(MockService::sensor(kind, samples::for_sensor(kind)));
        }
        peripheral.service(MockService::battery(samples::BATTERY_LEVEL[0]))
    }

    #[must_use]
    pub fn address(mut self, address: &str) -> Self {
        self.address = address.to_string();
        self
    }

    #[must_use]
    pub fn rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    /// Omit the RSSI property, as for a cached but silent device.
    #[must_use]
    pub fn without_rssi(mut self) -> Self {
        self.rssi = None;
        self
    }

    #[must_use]
    pub fn service(mut self, service: MockService) -> Self {
        self.services.push(service);
        self
    }

    /// Report `ServicesResolved = false` for the first `polls` property
    /// reads after each connect.
    #[must_use]
    pub fn resolve_after_polls(mut self, polls: u32) -> Self {
        self.resolve_after_polls = Some(polls);
        self
    }

    /// Never report the GATT tree as resolved.
    #[must_use]
    pub fn never_resolves(mut self) -> Self {
        self.resolve_after_polls = None;
        self
    }
}

#[derive(Debug)]
struct DeviceNode {
    name: Option<String>,
    address: String,
    rssi: Option<i16>,
    connected: bool,
    polls_since_connect: u32,
    property_reads: u32,
    resolve_after_polls: Option<u32>,
}

impl DeviceNode {
    fn resolved(&self) -> bool {
        self.connected
            && self
                .resolve_after_polls
                .is_some_and(|n| self.polls_since_connect > n)
    }
}

#[derive(Debug)]
struct CharacteristicNode {
    uuid: Uuid,
    value: Vec<u8>,
    flags: Vec<String>,
    gate: Option<ObjectPath>,
    notifier: Option<mpsc::Sender<Vec<u8>>>,
    writes: Vec<Vec<u8>>,
}

#[derive(Debug)]
enum Node {
    Device(DeviceNode),
    Service { uuid: Uuid },
    Characteristic(CharacteristicNode),
}

#[derive(Debug, Default)]
struct MockState {
    nodes: BTreeMap<ObjectPath, Node>,
}

impl MockState {
    fn insert(&mut self, device_path: ObjectPath, peripheral: MockPeripheral) {
        self.remove_subtree(&device_path);
        self.nodes.insert(
            device_path.clone(),
            Node::Device(DeviceNode {
                name: peripheral.name,
                address: peripheral.address,
                rssi: peripheral.rssi,
                connected: false,
                polls_since_connect: 0,
                property_reads: 0,
                resolve_after_polls: peripheral.resolve_after_polls,
            }),
        );

        // Attribute handles, numbered the way BlueZ names its objects.
        let mut handle: u16 = 0x000c;
        for service in peripheral.services {
            let service_path = device_path.child(&format!("service{:04x}", handle));
            handle += 1;
            self.nodes.insert(
                service_path.clone(),
                Node::Service { uuid: service.uuid },
            );

            let mut by_uuid = BTreeMap::new();
            for characteristic in &service.characteristics {
                by_uuid.insert(
                    characteristic.uuid,
                    service_path.child(&format!("char{:04x}", handle)),
                );
                handle += 2;
            }
            for characteristic in service.characteristics {
                let gate = characteristic
                    .gated_by
                    .and_then(|cfg| by_uuid.get(&cfg).cloned());
                if let Some(path) = by_uuid.get(&characteristic.uuid).cloned() {
                    self.nodes.insert(
                        path,
                        Node::Characteristic(CharacteristicNode {
                            uuid: characteristic.uuid,
                            value: characteristic.value,
                            flags: characteristic.flags,
                            gate,
                            notifier: None,
                            writes: Vec::new(),
                        }),
                    );
                }
            }
        }
    }

    fn remove_subtree(&mut self, root: &ObjectPath) -> bool {
        let prefix = format!("{}/", root);
        let before = self.nodes.len();
        self.nodes
            .retain(|path, _| path != root && !path.as_str().starts_with(&prefix));
        self.nodes.len() != before
    }

    fn device(&self, path: &ObjectPath) -> Result<&DeviceNode> {
        match self.nodes.get(path) {
            Some(Node::Device(device)) => Ok(device),
            _ => Err(Error::object_not_found(path)),
        }
    }

    fn device_mut(&mut self, path: &ObjectPath) -> Result<&mut DeviceNode> {
        match self.nodes.get_mut(path) {
            Some(Node::Device(device)) => Ok(device),
            _ => Err(Error::object_not_found(path)),
        }
    }

    fn characteristic_mut(&mut self, path: &ObjectPath) -> Result<&mut CharacteristicNode> {
        match self.nodes.get_mut(path) {
            Some(Node::Characteristic(c)) => Ok(c),
            _ => Err(Error::object_not_found(path)),
        }
    }

    /// The characteristic with `uuid` anywhere below `device`.
    fn find_characteristic(&self, device: &ObjectPath, uuid: Uuid) -> Option<ObjectPath> {
        let prefix = format!("{}/", device);
        self.nodes.iter().find_map(|(path, node)| match node {
            Node::Characteristic(c) if c.uuid == uuid && path.as_str().starts_with(&prefix) => {
                Some(path.clone())
            }
            _ => None,
        })
    }

    /// Fail with `NotConnected` unless the owning device is connected.
    fn require_connected(&self, adapter: &ObjectPath, path: &ObjectPath) -> Result<()> {
        let mut current = path.clone();
        while let Some(parent) = current.parent() {
            if &parent == adapter {
                break;
            }
            current = parent;
        }
        if self.device(&current)?.connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

/// A simulated Bluetooth stack.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use sensortag_core::{GattClient, ConnectionConfig};
/// use sensortag_core::mock::{MockPeripheral, MockTransport};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let transport = Arc::new(
///         MockTransport::new().with_peripheral(MockPeripheral::sensortag("CC2650 SensorTag")),
///     );
///     let config = ConnectionConfig::default().discovery_window(Duration::from_millis(10));
///     let client = GattClient::with_config(transport, config).unwrap();
///
///     let devices = client.discover_devices().await.unwrap();
///     assert_eq!(devices.len(), 1);
/// }
/// ```
pub struct MockTransport {
    adapter: ObjectPath,
    state: RwLock<MockState>,
    discovering: AtomicBool,
    scan_starts: AtomicU32,
    scan_stops: AtomicU32,
    connect_count: AtomicU32,
    should_fail: AtomicBool,
    fail_message: RwLock<String>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("adapter", &self.adapter)
            .field("discovering", &self.discovering.load(Ordering::Relaxed))
            .field("should_fail", &self.should_fail.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// An adapter at `/org/bluez/hci0` with no peripherals.
    pub fn new() -> Self {
        Self {
            adapter: ObjectPath::new("/org/bluez/hci0"),
            state: RwLock::new(MockState::default()),
            discovering: AtomicBool::new(false),
            scan_starts: AtomicU32::new(0),
            scan_stops: AtomicU32::new(0),
            connect_count: AtomicU32::new(0),
            should_fail: AtomicBool::new(false),
            fail_message: RwLock::new("Mock failure".to_string()),
        }
    }

    /// Builder-style [`add_peripheral`](Self::add_peripheral).
    #[must_use]
    pub fn with_peripheral(mut self, peripheral: MockPeripheral) -> Self {
        let path = self.device_path(&peripheral.address);
        self.state.get_mut().insert(path, peripheral);
        self
    }

    /// Object path a peripheral with `address` is exposed under.
    pub fn device_path(&self, address: &str) -> ObjectPath {
        self.adapter
            .child(&format!("dev_{}", address.replace(':', "_")))
    }

    // --- Test control methods ---

    /// Add (or replace) a peripheral.
    pub async fn add_peripheral(&self, peripheral: MockPeripheral) {
        let path = self.device_path(&peripheral.address);
        self.state.write().await.insert(path, peripheral);
    }

    /// Remove a peripheral and its whole GATT tree.
    pub async fn remove_peripheral(&self, address: &str) -> bool {
        let path = self.device_path(address);
        self.state.write().await.remove_subtree(&path)
    }

    /// Update or clear a peripheral's advertised RSSI.
    pub async fn set_rssi(&self, address: &str, rssi: Option<i16>) {
        let path = self.device_path(address);
        if let Ok(device) = self.state.write().await.device_mut(&path) {
            device.rssi = rssi;
        }
    }

    /// Replace a characteristic's value without notifying.
    pub async fn set_value(&self, address: &str, characteristic: Uuid, value: &[u8]) -> bool {
        let device = self.device_path(address);
        let mut state = self.state.write().await;
        let Some(path) = state.find_characteristic(&device, characteristic) else {
            return false;
        };
        match state.characteristic_mut(&path) {
            Ok(c) => {
                c.value = value.to_vec();
                true
            }
            Err(_) => false,
        }
    }

    /// Change a characteristic's value and deliver it to the active
    /// subscriber. Returns whether a subscriber received it.
    pub async fn notify(&self, address: &str, characteristic: Uuid, value: &[u8]) -> bool {
        let device = self.device_path(address);
        let sender = {
            let mut state = self.state.write().await;
            let Some(path) = state.find_characteristic(&device, characteristic) else {
                return false;
            };
            let Ok(c) = state.characteristic_mut(&path) else {
                return false;
            };
            c.value = value.to_vec();
            c.notifier.clone()
        };
        match sender {
            Some(tx) => tx.send(value.to_vec()).await.is_ok(),
            None => false,
        }
    }

    /// Whether a characteristic currently has a live subscriber.
    pub async fn is_notifying(&self, address: &str, characteristic: Uuid) -> bool {
        let device = self.device_path(address);
        let mut state = self.state.write().await;
        let Some(path) = state.find_characteristic(&device, characteristic) else {
            return false;
        };
        state
            .characteristic_mut(&path)
            .ok()
            .and_then(|c| c.notifier.as_ref())
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Every value written to a characteristic, oldest first.
    pub async fn writes(&self, address: &str, characteristic: Uuid) -> Vec<Vec<u8>> {
        let device = self.device_path(address);
        let mut state = self.state.write().await;
        let Some(path) = state.find_characteristic(&device, characteristic) else {
            return Vec::new();
        };
        state
            .characteristic_mut(&path)
            .map(|c| c.writes.clone())
            .unwrap_or_default()
    }

    /// Number of times a device's property bag was read.
    pub async fn property_reads(&self, address: &str) -> u32 {
        let path = self.device_path(address);
        self.state
            .read()
            .await
            .device(&path)
            .map(|d| d.property_reads)
            .unwrap_or(0)
    }

    pub async fn is_connected(&self, address: &str) -> bool {
        let path = self.device_path(address);
        self.state
            .read()
            .await
            .device(&path)
            .is_ok_and(|d| d.connected)
    }

    pub fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::Relaxed)
    }

    pub fn scan_starts(&self) -> u32 {
        self.scan_starts.load(Ordering::Relaxed)
    }

    pub fn scan_stops(&self) -> u32 {
        self.scan_stops.load(Ordering::Relaxed)
    }

    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::Relaxed)
    }

    /// Make every non-cleanup operation fail.
    pub async fn set_should_fail(&self, fail: bool, message: Option<&str>) {
        self.should_fail.store(fail, Ordering::Relaxed);
        if let Some(msg) = message {
            *self.fail_message.write().await = msg.to_string();
        }
    }

    async fn check_should_fail(&self) -> Result<()> {
        if self.should_fail.load(Ordering::Relaxed) {
            Err(Error::Transport(self.fail_message.read().await.clone()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn adapter(&self) -> ObjectPath {
        self.adapter.clone()
    }

    async fn start_discovery(&self) -> Result<()> {
        self.check_should_fail().await?;
        self.scan_starts.fetch_add(1, Ordering::Relaxed);
        self.discovering.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.scan_stops.fetch_add(1, Ordering::Relaxed);
        self.discovering.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn children(&self, path: &ObjectPath) -> Result<Vec<ObjectPath>> {
        self.check_should_fail().await?;
        let state = self.state.read().await;

        if path != &self.adapter {
            match state.nodes.get(path) {
                None => return Err(Error::object_not_found(path)),
                // Services stay hidden until resolution completes.
                Some(Node::Device(device)) if !device.resolved() => return Ok(Vec::new()),
                Some(_) => {}
            }
        }

        Ok(state
            .nodes
            .keys()
            .filter(|p| p.parent().as_ref() == Some(path))
            .cloned()
            .collect())
    }

    async fn properties(&self, path: &ObjectPath) -> Result<Properties> {
        self.check_should_fail().await?;
        let mut state = self.state.write().await;

        if path == &self.adapter {
            return Ok(Properties::new()
                .with(property::NAME, "hci0")
                .with("Discovering", self.is_discovering()));
        }

        match state.nodes.get_mut(path) {
            None => Err(Error::object_not_found(path)),
            Some(Node::Device(device)) => {
                device.property_reads += 1;
                if device.connected {
                    device.polls_since_connect = device.polls_since_connect.saturating_add(1);
                }
                let mut props = Properties::new()
                    .with(property::ADDRESS, device.address.as_str())
                    .with(property::CONNECTED, device.connected)
                    .with(property::SERVICES_RESOLVED, device.resolved());
                if let Some(name) = &device.name {
                    props.set(property::NAME, name.as_str());
                }
                if let Some(rssi) = device.rssi {
                    props.set(property::RSSI, rssi);
                }
                Ok(props)
            }
            Some(Node::Service { uuid }) => Ok(Properties::new()
                .with(property::UUID, *uuid)
                .with(property::PRIMARY, true)),
            Some(Node::Characteristic(c)) => Ok(Properties::new()
                .with(property::UUID, c.uuid)
                .with(property::FLAGS, c.flags.clone())
                .with(
                    property::NOTIFYING,
                    c.notifier.as_ref().is_some_and(|tx| !tx.is_closed()),
                )),
        }
    }

    async fn connect(&self, device: &ObjectPath) -> Result<()> {
        self.check_should_fail().await?;
        let mut state = self.state.write().await;
        let node = state.device_mut(device)?;
        node.connected = true;
        node.polls_since_connect = 0;
        self.connect_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn disconnect(&self, device: &ObjectPath) -> Result<()> {
        let mut state = self.state.write().await;
        let node = state.device_mut(device)?;
        node.connected = false;
        node.polls_since_connect = 0;

        let prefix = format!("{}/", device);
        for (path, node) in state.nodes.iter_mut() {
            if let Node::Characteristic(c) = node
                && path.as_str().starts_with(&prefix)
            {
                c.notifier = None;
            }
        }
        Ok(())
    }

    async fn read_value(&self, characteristic: &ObjectPath) -> Result<Vec<u8>> {
        self.check_should_fail().await?;
        let mut state = self.state.write().await;
        state.require_connected(&self.adapter, characteristic)?;

        let gate = state.characteristic_mut(characteristic)?.gate.clone();
        let enabled = match gate {
            Some(cfg) => state
                .characteristic_mut(&cfg)
                .is_ok_and(|c| c.value.iter().any(|b| *b != 0)),
            None => true,
        };

        let c = state.characteristic_mut(characteristic)?;
        if enabled {
            Ok(c.value.clone())
        } else {
            Ok(vec![0u8; c.value.len()])
        }
    }

    async fn write_value(&self, characteristic: &ObjectPath, value: &[u8]) -> Result<()> {
        self.check_should_fail().await?;
        let mut state = self.state.write().await;
        state.require_connected(&self.adapter, characteristic)?;

        let c = state.characteristic_mut(characteristic)?;
        c.writes.push(value.to_vec());
        c.value = value.to_vec();
        Ok(())
    }

    async fn start_notify(&self, characteristic: &ObjectPath) -> Result<ValueReceiver> {
        self.check_should_fail().await?;
        let mut state = self.state.write().await;
        state.require_connected(&self.adapter, characteristic)?;

        let c = state.characteristic_mut(characteristic)?;
        if !c.flags.iter().any(|f| f == "notify" || f == "indicate") {
            return Err(Error::transport(format!(
                "Notifications not supported by {}",
                characteristic
            )));
        }
        let (tx, rx) = mpsc::channel(NOTIFY_CHANNEL_CAPACITY);
        // Dropping the previous sender closes the older subscription.
        c.notifier = Some(tx);
        Ok(rx)
    }

    async fn stop_notify(&self, characteristic: &ObjectPath) -> Result<()> {
        let mut state = self.state.write().await;
        state.characteristic_mut(characteristic)?.notifier = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "B0:B4:48:C0:5D:00";

    fn sensortag() -> MockTransport {
        MockTransport::new()
            .with_peripheral(MockPeripheral::sensortag("CC2650 SensorTag").address(ADDRESS))
    }

    #[test]
    fn test_device_path_format() {
        let transport = MockTransport::new();
        assert_eq!(
            transport.device_path(ADDRESS).as_str(),
            "/org/bluez/hci0/dev_B0_B4_48_C0_5D_00"
        );
    }

    #[test]
    fn test_random_addresses_are_well_formed() {
        let peripheral = MockPeripheral::new("x");
        assert_eq!(peripheral.address.len(), 17);
        assert!(peripheral.address.starts_with("B0:B4:48:"));
    }

    #[tokio::test]
    async fn test_adapter_children_are_devices() {
        let transport = sensortag().with_peripheral(MockPeripheral::anonymous());
        let devices = transport.children(&transport.adapter()).await.unwrap();
        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|p| p.name().starts_with("dev_")));
    }

    #[tokio::test]
    async fn test_services_hidden_until_resolved() {
        let transport = MockTransport::new().with_peripheral(
            MockPeripheral::sensortag("CC2650")
                .address(ADDRESS)
                .resolve_after_polls(2),
        );
        let device = transport.device_path(ADDRESS);
        transport.connect(&device).await.unwrap();

        assert!(transport.children(&device).await.unwrap().is_empty());
        assert!(!transport.properties(&device).await.unwrap().services_resolved());
        assert!(!transport.properties(&device).await.unwrap().services_resolved());
        assert!(transport.properties(&device).await.unwrap().services_resolved());
        assert_eq!(transport.children(&device).await.unwrap().len(), 8);
        assert_eq!(transport.property_reads(ADDRESS).await, 3);
    }

    #[tokio::test]
    async fn test_never_resolves() {
        let transport = MockTransport::new()
            .with_peripheral(MockPeripheral::new("CC2650").address(ADDRESS).never_resolves());
        let device = transport.device_path(ADDRESS);
        transport.connect(&device).await.unwrap();
        for _ in 0..10 {
            assert!(!transport.properties(&device).await.unwrap().services_resolved());
        }
    }

    #[tokio::test]
    async fn test_gated_read_returns_zeros_until_enabled() {
        let transport = sensortag();
        let device = transport.device_path(ADDRESS);
        transport.connect(&device).await.unwrap();
        transport.properties(&device).await.unwrap();

        let state = transport.state.read().await;
        let data = state
            .find_characteristic(&device, uuids::LUXOMETER_DATA)
            .unwrap();
        let config = state
            .find_characteristic(&device, uuids::LUXOMETER_CONFIG)
            .unwrap();
        drop(state);

        assert_eq!(transport.read_value(&data).await.unwrap(), vec![0, 0]);
        transport.write_value(&config, &[0x01]).await.unwrap();
        assert_eq!(
            transport.read_value(&data).await.unwrap(),
            samples::LUXOMETER.to_vec()
        );
        assert_eq!(
            transport.writes(ADDRESS, uuids::LUXOMETER_CONFIG).await,
            vec![vec![0x01]]
        );
    }

    #[tokio::test]
    async fn test_read_requires_connection() {
        let transport = sensortag();
        let device = transport.device_path(ADDRESS);
        let battery = transport
            .state
            .read()
            .await
            .find_characteristic(&device, uuids::BATTERY_LEVEL)
            .unwrap();

        let result = transport.read_value(&battery).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_new_subscription_replaces_old() {
        let transport = sensortag();
        let device = transport.device_path(ADDRESS);
        transport.connect(&device).await.unwrap();
        let battery = transport
            .state
            .read()
            .await
            .find_characteristic(&device, uuids::BATTERY_LEVEL)
            .unwrap();

        let mut first = transport.start_notify(&battery).await.unwrap();
        let mut second = transport.start_notify(&battery).await.unwrap();

        assert!(transport.notify(ADDRESS, uuids::BATTERY_LEVEL, &[50]).await);
        assert_eq!(first.recv().await, None);
        assert_eq!(second.recv().await, Some(vec![50]));
    }

    #[tokio::test]
    async fn test_notify_rejected_without_flag() {
        let transport = sensortag();
        let device = transport.device_path(ADDRESS);
        transport.connect(&device).await.unwrap();
        let config = transport
            .state
            .read()
            .await
            .find_characteristic(&device, uuids::HUMIDITY_CONFIG)
            .unwrap();

        assert!(transport.start_notify(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_closes_subscriptions() {
        let transport = sensortag();
        let device = transport.device_path(ADDRESS);
        transport.connect(&device).await.unwrap();
        let data = transport
            .state
            .read()
            .await
            .find_characteristic(&device, uuids::MOVEMENT_DATA)
            .unwrap();

        let mut rx = transport.start_notify(&data).await.unwrap();
        assert!(transport.is_notifying(ADDRESS, uuids::MOVEMENT_DATA).await);

        transport.disconnect(&device).await.unwrap();
        assert_eq!(rx.recv().await, None);
        assert!(!transport.is_connected(ADDRESS).await);
    }

    #[tokio::test]
    async fn test_should_fail_spares_cleanup() {
        let transport = sensortag();
        transport.set_should_fail(true, Some("adapter powered off")).await;

        let err = transport.start_discovery().await.unwrap_err();
        assert!(err.to_string().contains("adapter powered off"));
        assert!(transport.children(&transport.adapter()).await.is_err());
        assert!(transport.stop_discovery().await.is_ok());
        assert_eq!(transport.scan_stops(), 1);
    }

    #[tokio::test]
    async fn test_removed_peripheral_vanishes() {
        let transport = sensortag();
        let device = transport.device_path(ADDRESS);
        assert!(transport.remove_peripheral(ADDRESS).await);

        let result = transport.properties(&device).await;
        assert!(matches!(result, Err(Error::ObjectNotFound { .. })));
        assert!(transport.children(&transport.adapter()).await.unwrap().is_empty());
    }
}
