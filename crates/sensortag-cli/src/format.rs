//! Output formatting utilities for text and JSON output.

use std::fmt::Write as _;

use anyhow::Result;
use owo_colors::OwoColorize;
use sensortag_core::{Device, SignalQuality};
use sensortag_types::{BatteryLevel, EnvironmentSnapshot, Measurement};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self {
            no_color,
            compact: false,
        }
    }

    /// Create with compact JSON option.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Serialize value to JSON string, respecting compact option.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }

    fn name(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.green().to_string()
        }
    }

    fn address(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.cyan().to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.dimmed().to_string()
        }
    }

    fn signal(&self, quality: Option<SignalQuality>) -> String {
        let Some(quality) = quality else {
            return "unknown".to_string();
        };
        if self.no_color {
            return quality.as_str().to_string();
        }
        match quality {
            SignalQuality::Excellent | SignalQuality::Good => quality.as_str().green().to_string(),
            SignalQuality::Fair => quality.as_str().yellow().to_string(),
            SignalQuality::Poor => quality.as_str().red().to_string(),
        }
    }
}

/// Lowercase space-separated hex, e.g. `0c 80 ff`.
#[must_use]
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

// ============================================================================
// Scan
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ScanEntry {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    pub signal: Option<&'static str>,
}

impl From<&Device> for ScanEntry {
    fn from(device: &Device) -> Self {
        Self {
            name: device.name().to_string(),
            address: device.address().to_string(),
            rssi: device.rssi(),
            signal: device.signal_quality().map(|q| q.as_str()),
        }
    }
}

#[must_use]
pub fn format_scan_text(devices: &[Device], opts: &FormatOptions) -> String {
    if devices.is_empty() {
        return "No devices found.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Found {} device(s):", devices.len());
    for device in devices {
        let rssi = device
            .rssi()
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "N/A".to_string());
        let _ = writeln!(
            out,
            "  {}  {}  {} ({})",
            opts.name(device.name()),
            opts.address(device.address()),
            rssi,
            opts.signal(device.signal_quality())
        );
    }
    out
}

pub fn format_scan_json(devices: &[Device], opts: &FormatOptions) -> Result<String> {
    let entries: Vec<ScanEntry> = devices.iter().map(ScanEntry::from).collect();
    opts.as_json(&entries)
}

// ============================================================================
// Services
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CharacteristicEntry {
    pub uuid: Uuid,
    pub name: Option<&'static str>,
    pub flags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServiceEntry {
    pub uuid: Uuid,
    pub name: Option<&'static str>,
    pub characteristics: Vec<CharacteristicEntry>,
}

#[derive(Debug, Serialize)]
pub struct ServiceTree {
    pub device: String,
    pub address: String,
    pub services: Vec<ServiceEntry>,
}

#[must_use]
pub fn format_services_text(tree: &ServiceTree, opts: &FormatOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({})",
        opts.name(&tree.device),
        opts.address(&tree.address)
    );
    for service in &tree.services {
        let label = service.name.unwrap_or("Unknown Service");
        let _ = writeln!(out, "  {} {}", service.uuid, opts.dim(label));
        for c in &service.characteristics {
            let label = c.name.unwrap_or("");
            let _ = write!(out, "    {} [{}] {}", c.uuid, c.flags.join(","), opts.dim(label));
            if let Some(value) = &c.value {
                let _ = write!(out, " = {}", value);
            }
            out.push('\n');
        }
    }
    out
}

pub fn format_services_json(tree: &ServiceTree, opts: &FormatOptions) -> Result<String> {
    opts.as_json(tree)
}

// ============================================================================
// Read
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ReadReport {
    pub device: String,
    pub address: String,
    pub timestamp: String,
    pub measurements: Vec<Measurement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<u8>,
}

impl ReadReport {
    pub fn new(
        device: &Device,
        measurements: Vec<Measurement>,
        battery: Option<BatteryLevel>,
        at: OffsetDateTime,
    ) -> Self {
        Self {
            device: device.name().to_string(),
            address: device.address().to_string(),
            timestamp: timestamp(at),
            measurements,
            battery: battery.map(|b| b.percent()),
        }
    }
}

#[must_use]
pub fn format_read_text(report: &ReadReport, opts: &FormatOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({})",
        opts.name(&report.device),
        opts.address(&report.address)
    );
    for measurement in &report.measurements {
        let _ = writeln!(
            out,
            "  {:<15} {}",
            measurement.kind().as_str(),
            measurement
        );
    }
    if let Some(battery) = report.battery {
        let _ = writeln!(out, "  {:<15} {}%", "battery", battery);
    }
    out
}

pub fn format_read_json(report: &ReadReport, opts: &FormatOptions) -> Result<String> {
    opts.as_json(report)
}

#[must_use]
pub fn format_snapshot_text(
    device: &Device,
    snapshot: &EnvironmentSnapshot,
    opts: &FormatOptions,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}) at {}",
        opts.name(device.name()),
        opts.address(device.address()),
        timestamp(snapshot.captured_at)
    );
    let _ = writeln!(out, "  Ambient:   {:.2} °C", snapshot.ambient);
    let _ = writeln!(out, "  Object:    {:.2} °C", snapshot.object);
    let _ = writeln!(out, "  Humidity:  {:.2} %RH", snapshot.humidity);
    let _ = writeln!(out, "  Pressure:  {:.2} hPa", snapshot.pressure);
    let _ = writeln!(out, "  Light:     {:.2} lux", snapshot.lux);
    out
}

pub fn format_snapshot_json(
    snapshot: &EnvironmentSnapshot,
    opts: &FormatOptions,
) -> Result<String> {
    opts.as_json(snapshot)
}

// ============================================================================
// Watch
// ============================================================================

#[derive(Debug, Serialize)]
struct WatchEvent<'a> {
    timestamp: String,
    #[serde(flatten)]
    measurement: &'a Measurement,
}

/// One line per notification. JSON output is always compact so each line
/// is a complete document.
pub fn format_watch_line(
    measurement: &Measurement,
    at: OffsetDateTime,
    json: bool,
    opts: &FormatOptions,
) -> Result<String> {
    if json {
        let event = WatchEvent {
            timestamp: timestamp(at),
            measurement,
        };
        return Ok(serde_json::to_string(&event)? + "\n");
    }
    let time = format!("{:02}:{:02}:{:02}", at.hour(), at.minute(), at.second());
    Ok(format!("[{}] {}\n", opts.dim(&time), measurement))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use sensortag_core::mock::{MockPeripheral, MockTransport};
    use sensortag_core::{ConnectionConfig, GattClient};
    use sensortag_types::{Luxometer, SensorKind};
    use time::macros::datetime;

    use super::*;
    use sensortag_core::uuids;

    const PLAIN: FormatOptions = FormatOptions {
        no_color: true,
        compact: false,
    };

    async fn discovered() -> Vec<Device> {
        let transport = Arc::new(
            MockTransport::new()
                .with_peripheral(
                    MockPeripheral::sensortag("CC2650 SensorTag")
                        .address("B0:B4:48:C0:5D:01")
                        .rssi(-52),
                )
                .with_peripheral(
                    MockPeripheral::new("Far Away")
                        .address("11:22:33:44:55:66")
                        .rssi(-90),
                ),
        );
        let config = ConnectionConfig::default().discovery_window(Duration::from_millis(10));
        let client = GattClient::with_config(transport, config).unwrap();
        client.discover_devices().await.unwrap()
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0x0c, 0x80, 0xff]), "0c 80 ff");
        assert_eq!(format_hex(&[]), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_text_lists_devices() {
        let devices = discovered().await;
        let text = format_scan_text(&devices, &PLAIN);
        assert!(text.starts_with("Found 2 device(s):"));
        assert!(text.contains("CC2650 SensorTag  B0:B4:48:C0:5D:01  -52 dBm (excellent)"));
        assert!(text.contains("-90 dBm (poor)"));
    }

    #[test]
    fn test_scan_text_empty() {
        assert_eq!(format_scan_text(&[], &PLAIN), "No devices found.\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_json_fields() {
        let devices = discovered().await;
        let json = format_scan_json(&devices, &PLAIN.with_compact(true)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        let entries = parsed.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        let tag = entries
            .iter()
            .find(|e| e["address"] == "B0:B4:48:C0:5D:01")
            .unwrap();
        assert_eq!(tag["name"], "CC2650 SensorTag");
        assert_eq!(tag["rssi"], -52);
        assert_eq!(tag["signal"], "excellent");
    }

    #[test]
    fn test_services_text_includes_labels_and_values() {
        let tree = ServiceTree {
            device: "CC2650 SensorTag".to_string(),
            address: "B0:B4:48:C0:5D:01".to_string(),
            services: vec![ServiceEntry {
                uuid: uuids::BATTERY_SERVICE,
                name: uuids::describe(&uuids::BATTERY_SERVICE),
                characteristics: vec![CharacteristicEntry {
                    uuid: uuids::BATTERY_LEVEL,
                    name: uuids::describe(&uuids::BATTERY_LEVEL),
                    flags: vec!["read".to_string(), "notify".to_string()],
                    value: Some(format_hex(&[87])),
                }],
            }],
        };
        let text = format_services_text(&tree, &PLAIN);
        assert!(text.contains("Battery Service"));
        assert!(text.contains("[read,notify] Battery Level = 57"));
    }

    #[test]
    fn test_watch_line_json_is_single_line() {
        let measurement = Measurement::Luxometer(Luxometer { lux: 16.0 });
        let at = datetime!(2024-05-01 12:30:05 UTC);
        let line = format_watch_line(&measurement, at, true, &PLAIN).unwrap();
        assert_eq!(line.matches('\n').count(), 1);
        let parsed: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(parsed["sensor"], "luxometer");
        assert_eq!(parsed["lux"], 16.0);
        assert_eq!(parsed["timestamp"], "2024-05-01T12:30:05Z");
    }

    #[test]
    fn test_watch_line_text() {
        let measurement = Measurement::Luxometer(Luxometer { lux: 16.0 });
        let at = datetime!(2024-05-01 12:30:05 UTC);
        let line = format_watch_line(&measurement, at, false, &PLAIN).unwrap();
        assert_eq!(line, "[12:30:05] lux: 16.00\n");
        assert_eq!(measurement.kind(), SensorKind::Luxometer);
    }
}
