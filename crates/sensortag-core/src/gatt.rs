//! GATT client: discovery, connection lifecycle and tree traversal.
//!
//! Handles are thin, cloneable views onto the transport's object tree:
//!
//! ```text
//! GattClient ── discover_devices() ──> Device ── services() ──> Service
//!                                                                  │
//!                                   Characteristic <── characteristics()
//! ```
//!
//! Nothing is cached. Every `services()` or `characteristics()` call walks
//! the tree again, so a handle never goes stale while the link is up.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::streaming::{DEFAULT_BUFFER_SIZE, NotificationStream, NotifyHandle, ValueStream};
use crate::transport::{ObjectPath, Properties, SharedTransport, property};

/// Default length of a discovery scan.
pub const DEFAULT_DISCOVERY_WINDOW: Duration = Duration::from_secs(10);

/// Default sleep between `ServicesResolved` polls.
pub const DEFAULT_RESOLVE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default bound on the wait for service resolution.
pub const DEFAULT_RESOLUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Timing and buffering for discovery, connection and notifications.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use sensortag_core::ConnectionConfig;
///
/// // Short scan, wait forever for a slow peripheral to resolve.
/// let config = ConnectionConfig::default()
///     .discovery_window(Duration::from_secs(3))
///     .unbounded_resolution();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// How long discovery scans before enumerating devices.
    pub discovery_window: Duration,
    /// Sleep between `ServicesResolved` polls while connecting.
    pub resolve_poll_interval: Duration,
    /// Upper bound on the resolution wait; `None` waits indefinitely.
    pub resolution_timeout: Option<Duration>,
    /// Capacity of each notification stream's buffer.
    pub notification_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            discovery_window: DEFAULT_DISCOVERY_WINDOW,
            resolve_poll_interval: DEFAULT_RESOLVE_POLL_INTERVAL,
            resolution_timeout: Some(DEFAULT_RESOLUTION_TIMEOUT),
            notification_buffer: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ConnectionConfig {
    /// Create a new connection config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config for nearby devices with strong signals.
    ///
    /// Scans briefly and gives up on resolution sooner.
    pub fn fast() -> Self {
        Self {
            discovery_window: Duration::from_secs(3),
            resolve_poll_interval: Duration::from_millis(50),
            resolution_timeout: Some(Duration::from_secs(10)),
            notification_buffer: DEFAULT_BUFFER_SIZE,
        }
    }

    #[must_use]
    pub fn discovery_window(mut self, window: Duration) -> Self {
        self.discovery_window = window;
        self
    }

    #[must_use]
    pub fn resolve_poll_interval(mut self, interval: Duration) -> Self {
        self.resolve_poll_interval = interval;
        self
    }

    #[must_use]
    pub fn resolution_timeout(mut self, timeout: Duration) -> Self {
        self.resolution_timeout = Some(timeout);
        self
    }

    /// Wait for service resolution without a bound.
    #[must_use]
    pub fn unbounded_resolution(mut self) -> Self {
        self.resolution_timeout = None;
        self
    }

    #[must_use]
    pub fn notification_buffer(mut self, size: usize) -> Self {
        self.notification_buffer = size;
        self
    }

    /// Validate the options and return an error if invalid.
    ///
    /// Checks that:
    /// - `resolve_poll_interval` is > 0
    /// - `resolution_timeout`, when set, is > 0
    /// - `notification_buffer` is > 0
    pub fn validate(&self) -> Result<()> {
        if self.resolve_poll_interval.is_zero() {
            return Err(Error::invalid_config("resolve_poll_interval must be > 0"));
        }
        if self.resolution_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::invalid_config("resolution_timeout must be > 0"));
        }
        if self.notification_buffer == 0 {
            return Err(Error::invalid_config("notification_buffer must be > 0"));
        }
        Ok(())
    }
}

/// Signal strength quality levels based on RSSI values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalQuality {
    /// Below -85 dBm.
    Poor,
    /// -85 to -75 dBm.
    Fair,
    /// -75 to -60 dBm.
    Good,
    /// Above -60 dBm.
    Excellent,
}

impl SignalQuality {
    /// Determine signal quality from RSSI value in dBm.
    pub fn from_rssi(rssi: i16) -> Self {
        match rssi {
            r if r > -60 => SignalQuality::Excellent,
            r if r > -75 => SignalQuality::Good,
            r if r > -85 => SignalQuality::Fair,
            _ => SignalQuality::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalQuality::Excellent => "excellent",
            SignalQuality::Good => "good",
            SignalQuality::Fair => "fair",
            SignalQuality::Poor => "poor",
        }
    }
}

/// Entry point to the Bluetooth stack.
///
/// One client per process is typical. Cloning is cheap and shares the
/// transport.
#[derive(Clone)]
pub struct GattClient {
    transport: SharedTransport,
    config: ConnectionConfig,
}

impl std::fmt::Debug for GattClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GattClient")
            .field("adapter", &self.transport.adapter())
            .field("config", &self.config)
            .finish()
    }
}

impl GattClient {
    /// Client with the default [`ConnectionConfig`].
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            config: ConnectionConfig::default(),
        }
    }

    /// Client with a validated custom config.
    pub fn with_config(transport: SharedTransport, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { transport, config })
    }

    /// Client over the system's first Bluetooth adapter.
    pub async fn bluetooth(config: ConnectionConfig) -> Result<Self> {
        let transport = crate::bluetooth::BtleplugTransport::new().await?;
        Self::with_config(Arc::new(transport), config)
    }

    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Scan for the discovery window and return every device that
    /// advertised both a name and an RSSI.
    ///
    /// Scanning is stopped before returning, whether or not enumeration
    /// succeeded.
    #[tracing::instrument(
        level = "info",
        skip(self),
        fields(window = ?self.config.discovery_window)
    )]
    pub async fn discover_devices(&self) -> Result<Vec<Device>> {
        info!("Starting BLE discovery...");
        self.transport.start_discovery().await?;

        sleep(self.config.discovery_window).await;
        let enumerated = self.enumerate_devices().await;

        let stopped = self.transport.stop_discovery().await;
        let devices = enumerated?;
        stopped?;

        info!("Discovery found {} device(s)", devices.len());
        Ok(devices)
    }

    async fn enumerate_devices(&self) -> Result<Vec<Device>> {
        let adapter = self.transport.adapter();
        let mut devices = Vec::new();

        for path in self.transport.children(&adapter).await? {
            let props = self.transport.properties(&path).await?;
            let (Some(name), Some(rssi)) = (props.name(), props.rssi()) else {
                debug!("Skipping {}: no name or RSSI", path);
                continue;
            };
            let address = props
                .address()
                .map(str::to_string)
                .unwrap_or_else(|| path.name().to_string());

            debug!("Found {} ({}) at {} dBm", name, address, rssi);
            devices.push(Device {
                transport: self.transport.clone(),
                path,
                name: name.to_string(),
                address,
                rssi: Some(rssi),
                config: self.config.clone(),
            });
        }

        Ok(devices)
    }

    /// Discover and return the first device whose name contains `filter`,
    /// ignoring case.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn find_device_by_name(&self, filter: &str) -> Result<Device> {
        let devices = self.discover_devices().await?;
        if devices.is_empty() {
            return Err(Error::DeviceNotFound(DeviceNotFoundReason::NoDevicesInRange));
        }

        let needle = filter.to_lowercase();
        devices
            .into_iter()
            .find(|d| d.name.to_lowercase().contains(&needle))
            .ok_or_else(|| Error::device_not_found(filter))
    }
}

/// A remote peripheral found by discovery.
#[derive(Clone)]
pub struct Device {
    transport: SharedTransport,
    path: ObjectPath,
    name: String,
    address: String,
    rssi: Option<i16>,
    config: ConnectionConfig,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("path", &self.path)
            .finish()
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Device {
    /// Name advertised at discovery time.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// RSSI seen at discovery time.
    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }

    pub fn signal_quality(&self) -> Option<SignalQuality> {
        self.rssi.map(SignalQuality::from_rssi)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Fetch the current property bag.
    pub async fn properties(&self) -> Result<Properties> {
        self.transport.properties(&self.path).await
    }

    pub async fn is_connected(&self) -> Result<bool> {
        Ok(self.properties().await?.connected())
    }

    pub async fn is_services_resolved(&self) -> Result<bool> {
        Ok(self.properties().await?.services_resolved())
    }

    /// Connect and wait until the GATT tree is resolved.
    ///
    /// Polls `ServicesResolved` every
    /// [`resolve_poll_interval`](ConnectionConfig::resolve_poll_interval).
    /// Fails with [`Error::ResolutionTimeout`] once
    /// [`resolution_timeout`](ConnectionConfig::resolution_timeout) elapses.
    #[tracing::instrument(
        level = "info",
        skip(self),
        fields(device = %self.name, address = %self.address)
    )]
    pub async fn connect(&self) -> Result<()> {
        info!("Connecting to device...");
        self.transport.connect(&self.path).await?;

        let polls = self.wait_for_services().await?;
        debug!("Services resolved after {} poll(s)", polls);
        info!("Connected!");
        Ok(())
    }

    async fn wait_for_services(&self) -> Result<u32> {
        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            polls += 1;
            if self.is_services_resolved().await? {
                return Ok(polls);
            }

            if let Some(limit) = self.config.resolution_timeout
                && started.elapsed() >= limit
            {
                warn!(
                    "Services of {} not resolved after {:?} ({} polls)",
                    self.name, limit, polls
                );
                return Err(Error::ResolutionTimeout {
                    device: self.name.clone(),
                    duration: limit,
                    polls,
                });
            }

            sleep(self.config.resolve_poll_interval).await;
        }
    }

    /// Request a disconnect. Does not wait for the link to drop.
    #[tracing::instrument(level = "info", skip(self), fields(device = %self.name))]
    pub async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from device...");
        self.transport.disconnect(&self.path).await
    }

    /// Enumerate the device's services.
    pub async fn services(&self) -> Result<Vec<Service>> {
        let children = self.transport.children(&self.path).await?;
        let mut services = Vec::with_capacity(children.len());

        for path in children {
            let uuid = require_uuid(&self.transport.properties(&path).await?, &path)?;
            services.push(Service {
                transport: self.transport.clone(),
                path,
                uuid,
                notification_buffer: self.config.notification_buffer,
            });
        }

        debug!("{} exposes {} service(s)", self.name, services.len());
        Ok(services)
    }

    /// First service with `uuid`.
    pub async fn service_by_uuid(&self, uuid: Uuid) -> Result<Service> {
        let services = self.services().await?;
        let service_count = services.len();
        services
            .into_iter()
            .find(|s| s.uuid == uuid)
            .ok_or(Error::ServiceNotFound {
                uuid,
                service_count,
            })
    }

    /// Resolve a characteristic in one call.
    pub async fn characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Characteristic> {
        self.service_by_uuid(service)
            .await?
            .characteristic_by_uuid(characteristic)
            .await
    }
}

fn require_uuid(props: &Properties, path: &ObjectPath) -> Result<Uuid> {
    props.uuid().ok_or_else(|| Error::MissingProperty {
        path: path.clone(),
        property: property::UUID,
    })
}

/// A GATT service of a connected device.
#[derive(Clone)]
pub struct Service {
    transport: SharedTransport,
    path: ObjectPath,
    uuid: Uuid,
    notification_buffer: usize,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("uuid", &self.uuid)
            .field("path", &self.path)
            .finish()
    }
}

impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.uuid == other.uuid
    }
}

impl Service {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Enumerate the service's characteristics.
    pub async fn characteristics(&self) -> Result<Vec<Characteristic>> {
        let children = self.transport.children(&self.path).await?;
        let mut characteristics = Vec::with_capacity(children.len());

        for path in children {
            let uuid = require_uuid(&self.transport.properties(&path).await?, &path)?;
            characteristics.push(Characteristic {
                transport: self.transport.clone(),
                path,
                uuid,
                service: self.uuid,
                notification_buffer: self.notification_buffer,
            });
        }

        Ok(characteristics)
    }

    /// First characteristic with `uuid`.
    pub async fn characteristic_by_uuid(&self, uuid: Uuid) -> Result<Characteristic> {
        let characteristics = self.characteristics().await?;
        let characteristic_count = characteristics.len();
        characteristics
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(Error::CharacteristicNotFound {
                uuid,
                service: self.uuid,
                characteristic_count,
            })
    }
}

/// A characteristic within a service.
#[derive(Clone)]
pub struct Characteristic {
    transport: SharedTransport,
    path: ObjectPath,
    uuid: Uuid,
    service: Uuid,
    notification_buffer: usize,
}

impl std::fmt::Debug for Characteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Characteristic")
            .field("uuid", &self.uuid)
            .field("service", &self.service)
            .field("path", &self.path)
            .finish()
    }
}

impl PartialEq for Characteristic {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.uuid == other.uuid
    }
}

impl Characteristic {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// UUID of the owning service.
    pub fn service_uuid(&self) -> Uuid {
        self.service
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Capability flags as reported by the transport ("read", "notify", ...).
    pub async fn flags(&self) -> Result<Vec<String>> {
        Ok(self.transport.properties(&self.path).await?.flags())
    }

    #[tracing::instrument(level = "debug", skip(self), fields(uuid = %self.uuid))]
    pub async fn read(&self) -> Result<Vec<u8>> {
        let value = self.transport.read_value(&self.path).await?;
        debug!("Read {} byte(s)", value.len());
        Ok(value)
    }

    /// Write with response.
    #[tracing::instrument(
        level = "debug",
        skip(self, value),
        fields(uuid = %self.uuid, len = value.len())
    )]
    pub async fn write(&self, value: &[u8]) -> Result<()> {
        self.transport.write_value(&self.path, value).await
    }

    /// Enable notifications and invoke `callback` with each new value.
    ///
    /// The callback runs on a dedicated tokio task. Returns immediately.
    pub async fn start_notify<F>(&self, callback: F) -> Result<NotifyHandle>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let source = self.transport.start_notify(&self.path).await?;
        debug!("Notifications started on {}", self.uuid);
        Ok(NotifyHandle::spawn(
            self.transport.clone(),
            self.path.clone(),
            self.uuid,
            source,
            callback,
        ))
    }

    /// Disable notifications, ending any active subscription.
    pub async fn stop_notify(&self) -> Result<()> {
        self.transport.stop_notify(&self.path).await
    }

    /// Enable notifications and return them as a stream of raw values.
    pub async fn subscribe(&self) -> Result<ValueStream> {
        self.subscribe_with(None, |value| value).await
    }

    /// Enable notifications and map each value before it is queued.
    ///
    /// `initial` is yielded ahead of the first notification.
    pub async fn subscribe_with<T, F>(
        &self,
        initial: Option<T>,
        map: F,
    ) -> Result<NotificationStream<T>>
    where
        T: Send + 'static,
        F: FnMut(Vec<u8>) -> T + Send + 'static,
    {
        let source = self.transport.start_notify(&self.path).await?;
        debug!("Subscribed to {}", self.uuid);
        Ok(NotificationStream::spawn(
            self.transport.clone(),
            self.path.clone(),
            self.uuid,
            source,
            self.notification_buffer,
            initial,
            map,
        ))
    }
}
