//! Read and snapshot command implementations.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use sensortag_core::{GattClient, SensorTag};
use sensortag_types::SensorKind;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::cli::OutputFormat;
use crate::format::{
    FormatOptions, ReadReport, format_read_json, format_read_text, format_snapshot_json,
    format_snapshot_text,
};
use crate::util::{connect_tag, write_output};

/// Arguments for the read command.
pub struct ReadArgs<'a> {
    pub filter: &'a str,
    /// Sensors to read; empty means every sensor.
    pub sensors: &'a [SensorKind],
    pub battery: bool,
    /// Wait between enabling and the first read.
    pub settle: Duration,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub opts: &'a FormatOptions,
}

pub async fn cmd_read(client: &GattClient, args: ReadArgs<'_>) -> Result<()> {
    let ReadArgs {
        filter,
        sensors,
        battery,
        settle,
        format,
        output,
        opts,
    } = args;

    let sensors: Vec<SensorKind> = if sensors.is_empty() {
        SensorKind::ALL.to_vec()
    } else {
        sensors.to_vec()
    };

    let tag = connect_tag(client, filter).await?;
    let report = read_report(&tag, &sensors, battery, settle).await;
    disconnect(&tag).await;
    let report = report?;

    let content = match format {
        OutputFormat::Json => format_read_json(&report, opts)?,
        OutputFormat::Text => format_read_text(&report, opts),
    };
    write_output(output, &content)
}

async fn read_report(
    tag: &SensorTag,
    sensors: &[SensorKind],
    battery: bool,
    settle: Duration,
) -> Result<ReadReport> {
    for kind in sensors {
        tag.enable(*kind)
            .await
            .with_context(|| format!("Failed to enable {}", kind))?;
    }
    debug!("Waiting {:?} for sensors to settle", settle);
    tokio::time::sleep(settle).await;

    let mut measurements = Vec::with_capacity(sensors.len());
    for kind in sensors {
        let measurement = tag
            .read(*kind)
            .await
            .with_context(|| format!("Failed to read {}", kind))?;
        measurements.push(measurement);
    }

    let battery = if battery {
        Some(
            tag.read_battery_level()
                .await
                .context("Failed to read battery level")?,
        )
    } else {
        None
    };

    Ok(ReadReport::new(
        tag.device(),
        measurements,
        battery,
        OffsetDateTime::now_utc(),
    ))
}

/// Read the environment sensors together, as one snapshot.
pub async fn cmd_snapshot(
    client: &GattClient,
    filter: &str,
    settle: Duration,
    format: OutputFormat,
    output: Option<&PathBuf>,
    opts: &FormatOptions,
) -> Result<()> {
    let tag = connect_tag(client, filter).await?;
    let snapshot = async {
        tag.enable_all().await.context("Failed to enable sensors")?;
        tokio::time::sleep(settle).await;
        tag.read_environment()
            .await
            .context("Failed to read environment")
    }
    .await;
    disconnect(&tag).await;
    let snapshot = snapshot?;

    let content = match format {
        OutputFormat::Json => format_snapshot_json(&snapshot, opts)?,
        OutputFormat::Text => format_snapshot_text(tag.device(), &snapshot, opts),
    };
    write_output(output, &content)
}

async fn disconnect(tag: &SensorTag) {
    if let Err(e) = tag.disconnect().await {
        warn!("Disconnect from {} failed: {}", tag.name(), e);
    }
}
