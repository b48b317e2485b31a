//! [`Transport`] over the platform Bluetooth stack via btleplug.
//!
//! btleplug exposes peripherals and their services as plain values rather
//! than an addressable tree. This transport assigns BlueZ-style object paths
//! as nodes are enumerated and remembers which btleplug value each path
//! refers to:
//!
//! ```text
//! /hci0
//! └── /hci0/dev_B0_B4_48_C0_5D_00
//!     └── /hci0/dev_B0_B4_48_C0_5D_00/service0003
//!         └── /hci0/dev_B0_B4_48_C0_5D_00/service0003/char0001
//! ```
//!
//! A path is valid once its parent's children have been listed.

use std::collections::HashMap;

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic as BtCharacteristic, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::transport::{
    NOTIFY_CHANNEL_CAPACITY, ObjectPath, Properties, Transport, ValueReceiver, property,
};

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms they wrap the
/// MAC address.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Stable identifier for a peripheral.
///
/// macOS reports every address as 00:00:00:00:00:00; fall back to the
/// peripheral ID there.
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == "00:00:00:00:00:00" {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}

/// Turn an arbitrary identifier into a path segment.
fn object_segment(identifier: &str) -> String {
    identifier
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// BlueZ names for characteristic property flags.
fn flag_names(flags: CharPropFlags) -> Vec<String> {
    const NAMES: [(CharPropFlags, &str); 8] = [
        (CharPropFlags::BROADCAST, "broadcast"),
        (CharPropFlags::READ, "read"),
        (CharPropFlags::WRITE_WITHOUT_RESPONSE, "write-without-response"),
        (CharPropFlags::WRITE, "write"),
        (CharPropFlags::NOTIFY, "notify"),
        (CharPropFlags::INDICATE, "indicate"),
        (CharPropFlags::AUTHENTICATED_SIGNED_WRITES, "authenticated-signed-writes"),
        (CharPropFlags::EXTENDED_PROPERTIES, "extended-properties"),
    ];
    NAMES
        .iter()
        .filter(|(flag, _)| flags.contains(*flag))
        .map(|(_, name)| name.to_string())
        .collect()
}

#[derive(Clone)]
enum Node {
    Device(Peripheral),
    Service {
        peripheral: Peripheral,
        uuid: Uuid,
        primary: bool,
    },
    Characteristic {
        peripheral: Peripheral,
        characteristic: BtCharacteristic,
    },
}

/// Transport backed by a btleplug [`Adapter`].
pub struct BtleplugTransport {
    adapter: Adapter,
    adapter_name: String,
    root: ObjectPath,
    nodes: RwLock<HashMap<ObjectPath, Node>>,
    notifiers: Mutex<HashMap<ObjectPath, Notifier>>,
}

/// Pump task forwarding one characteristic's notifications.
struct Notifier {
    token: CancellationToken,
    pump: JoinHandle<()>,
}

impl std::fmt::Debug for BtleplugTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleplugTransport")
            .field("adapter", &self.adapter_name)
            .field("root", &self.root)
            .finish()
    }
}

impl BtleplugTransport {
    /// Transport over the first available adapter.
    pub async fn new() -> Result<Self> {
        Self::with_adapter(get_adapter().await?).await
    }

    pub async fn with_adapter(adapter: Adapter) -> Result<Self> {
        let adapter_name = adapter
            .adapter_info()
            .await
            .unwrap_or_else(|_| "hci0".to_string());
        let short = adapter_name.split_whitespace().next().unwrap_or("hci0");
        let root = ObjectPath::new(format!("/{}", object_segment(short)));
        info!("Using Bluetooth adapter {}", adapter_name);

        Ok(Self {
            adapter,
            adapter_name,
            root,
            nodes: RwLock::new(HashMap::new()),
            notifiers: Mutex::new(HashMap::new()),
        })
    }

    async fn node(&self, path: &ObjectPath) -> Result<Node> {
        self.nodes
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| Error::object_not_found(path))
    }

    async fn peripheral(&self, path: &ObjectPath) -> Result<Peripheral> {
        match self.node(path).await? {
            Node::Device(peripheral) => Ok(peripheral),
            _ => Err(Error::object_not_found(path)),
        }
    }

    async fn characteristic(&self, path: &ObjectPath) -> Result<(Peripheral, BtCharacteristic)> {
        match self.node(path).await? {
            Node::Characteristic {
                peripheral,
                characteristic,
            } => Ok((peripheral, characteristic)),
            _ => Err(Error::object_not_found(path)),
        }
    }

    async fn register(&self, entries: Vec<(ObjectPath, Node)>) -> Vec<ObjectPath> {
        let mut nodes = self.nodes.write().await;
        let mut paths = Vec::with_capacity(entries.len());
        for (path, node) in entries {
            paths.push(path.clone());
            nodes.insert(path, node);
        }
        paths.sort();
        paths
    }

    /// Cancel the pump for `path` and wait for it to exit, so its receiver
    /// is closed by the time this returns.
    async fn cancel_notifier(&self, path: &ObjectPath) -> bool {
        let removed = self.notifiers.lock().await.remove(path);
        match removed {
            Some(notifier) => {
                notifier.token.cancel();
                let _ = notifier.pump.await;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Transport for BtleplugTransport {
    fn adapter(&self) -> ObjectPath {
        self.root.clone()
    }

    async fn start_discovery(&self) -> Result<()> {
        debug!("Starting scan on {}", self.adapter_name);
        self.adapter.start_scan(ScanFilter::default()).await?;
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<()> {
        debug!("Stopping scan on {}", self.adapter_name);
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn children(&self, path: &ObjectPath) -> Result<Vec<ObjectPath>> {
        if path == &self.root {
            let mut entries = Vec::new();
            for peripheral in self.adapter.peripherals().await? {
                let address = match peripheral.properties().await? {
                    Some(props) => props.address.to_string(),
                    None => continue,
                };
                let identifier = create_identifier(&address, &peripheral.id());
                let child = self
                    .root
                    .child(&format!("dev_{}", object_segment(&identifier)));
                entries.push((child, Node::Device(peripheral)));
            }
            return Ok(self.register(entries).await);
        }

        match self.node(path).await? {
            Node::Device(peripheral) => {
                let entries = peripheral
                    .services()
                    .into_iter()
                    .enumerate()
                    .map(|(i, service)| {
                        (
                            path.child(&format!("service{:04x}", i)),
                            Node::Service {
                                peripheral: peripheral.clone(),
                                uuid: service.uuid,
                                primary: service.primary,
                            },
                        )
                    })
                    .collect();
                Ok(self.register(entries).await)
            }
            Node::Service {
                peripheral, uuid, ..
            } => {
                let Some(service) = peripheral.services().into_iter().find(|s| s.uuid == uuid)
                else {
                    return Err(Error::object_not_found(path));
                };
                let entries = service
                    .characteristics
                    .into_iter()
                    .enumerate()
                    .map(|(i, characteristic)| {
                        (
                            path.child(&format!("char{:04x}", i)),
                            Node::Characteristic {
                                peripheral: peripheral.clone(),
                                characteristic,
                            },
                        )
                    })
                    .collect();
                Ok(self.register(entries).await)
            }
            Node::Characteristic { .. } => Ok(Vec::new()),
        }
    }

    async fn properties(&self, path: &ObjectPath) -> Result<Properties> {
        if path == &self.root {
            return Ok(Properties::new().with(property::NAME, self.adapter_name.as_str()));
        }

        match self.node(path).await? {
            Node::Device(peripheral) => {
                let props = peripheral
                    .properties()
                    .await?
                    .ok_or_else(|| Error::object_not_found(path))?;
                let connected = peripheral.is_connected().await?;
                let resolved = connected && !peripheral.services().is_empty();

                let mut bag = Properties::new()
                    .with(property::ADDRESS, props.address.to_string())
                    .with(property::CONNECTED, connected)
                    .with(property::SERVICES_RESOLVED, resolved);
                if let Some(name) = props.local_name {
                    bag.set(property::NAME, name);
                }
                if let Some(rssi) = props.rssi {
                    bag.set(property::RSSI, rssi);
                }
                Ok(bag)
            }
            Node::Service { uuid, primary, .. } => Ok(Properties::new()
                .with(property::UUID, uuid)
                .with(property::PRIMARY, primary)),
            Node::Characteristic { characteristic, .. } => {
                let notifying = self.notifiers.lock().await.contains_key(path);
                Ok(Properties::new()
                    .with(property::UUID, characteristic.uuid)
                    .with(property::FLAGS, flag_names(characteristic.properties))
                    .with(property::NOTIFYING, notifying))
            }
        }
    }

    async fn connect(&self, device: &ObjectPath) -> Result<()> {
        let peripheral = self.peripheral(device).await?;
        peripheral.connect().await?;
        debug!("Link up to {}, discovering services", device);
        peripheral.discover_services().await?;
        Ok(())
    }

    async fn disconnect(&self, device: &ObjectPath) -> Result<()> {
        let peripheral = self.peripheral(device).await?;

        let prefix = format!("{}/", device);
        let mut notifiers = self.notifiers.lock().await;
        notifiers.retain(|path, notifier| {
            let owned = path.as_str().starts_with(&prefix);
            if owned {
                notifier.token.cancel();
            }
            !owned
        });
        drop(notifiers);

        peripheral.disconnect().await?;
        Ok(())
    }

    async fn read_value(&self, characteristic: &ObjectPath) -> Result<Vec<u8>> {
        let (peripheral, c) = self.characteristic(characteristic).await?;
        Ok(peripheral.read(&c).await?)
    }

    async fn write_value(&self, characteristic: &ObjectPath, value: &[u8]) -> Result<()> {
        let (peripheral, c) = self.characteristic(characteristic).await?;
        peripheral.write(&c, value, WriteType::WithResponse).await?;
        Ok(())
    }

    async fn start_notify(&self, characteristic: &ObjectPath) -> Result<ValueReceiver> {
        let (peripheral, c) = self.characteristic(characteristic).await?;
        self.cancel_notifier(characteristic).await;

        peripheral.subscribe(&c).await?;
        let mut notifications = peripheral.notifications().await?;

        let (tx, rx) = mpsc::channel(NOTIFY_CHANNEL_CAPACITY);
        let token = CancellationToken::new();
        let task_token = token.clone();
        let uuid = c.uuid;
        let path = characteristic.clone();

        let pump = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    notification = notifications.next() => match notification {
                        Some(n) if n.uuid == uuid => tokio::select! {
                            _ = task_token.cancelled() => break,
                            sent = tx.send(n.value) => {
                                if sent.is_err() {
                                    break;
                                }
                            }
                        },
                        Some(_) => {}
                        None => {
                            debug!("Notification stream for {} ended", path);
                            break;
                        }
                    }
                }
            }
        });

        self.notifiers
            .lock()
            .await
            .insert(characteristic.clone(), Notifier { token, pump });
        Ok(rx)
    }

    async fn stop_notify(&self, characteristic: &ObjectPath) -> Result<()> {
        if !self.cancel_notifier(characteristic).await {
            return Ok(());
        }
        let (peripheral, c) = self.characteristic(characteristic).await?;
        if let Err(e) = peripheral.unsubscribe(&c).await {
            warn!("Unsubscribe from {} failed: {}", characteristic, e);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_segment() {
        assert_eq!(object_segment("B0:B4:48:C0:5D:00"), "B0_B4_48_C0_5D_00");
        assert_eq!(
            object_segment("5a1f7c2e-0000-4000-8000-00aabbccddee"),
            "5a1f7c2e_0000_4000_8000_00aabbccddee"
        );
        assert_eq!(object_segment("hci0"), "hci0");
    }

    #[test]
    fn test_flag_names() {
        let flags = CharPropFlags::READ | CharPropFlags::NOTIFY;
        assert_eq!(flag_names(flags), vec!["read", "notify"]);

        let flags = CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE;
        assert_eq!(flag_names(flags), vec!["write-without-response", "write"]);

        assert!(flag_names(CharPropFlags::empty()).is_empty());
    }
}
