//! Services command implementation: dump the GATT tree of one device.

use std::path::PathBuf;

use anyhow::{Context, Result};
use sensortag_core::{Device, GattClient, uuids};
use tracing::{debug, warn};

use crate::cli::OutputFormat;
use crate::format::{
    CharacteristicEntry, FormatOptions, ServiceEntry, ServiceTree, format_hex,
    format_services_json, format_services_text,
};
use crate::util::write_output;

pub async fn cmd_services(
    client: &GattClient,
    filter: &str,
    read_values: bool,
    format: OutputFormat,
    output: Option<&PathBuf>,
    opts: &FormatOptions,
) -> Result<()> {
    let device = client
        .find_device_by_name(filter)
        .await
        .with_context(|| format!("No device matching '{}'", filter))?;
    device
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {}", device.name()))?;

    let tree = collect_tree(&device, read_values).await;
    if let Err(e) = device.disconnect().await {
        warn!("Disconnect from {} failed: {}", device.name(), e);
    }
    let tree = tree?;

    let content = match format {
        OutputFormat::Json => format_services_json(&tree, opts)?,
        OutputFormat::Text => format_services_text(&tree, opts),
    };
    write_output(output, &content)
}

async fn collect_tree(device: &Device, read_values: bool) -> Result<ServiceTree> {
    let mut services = Vec::new();
    for service in device.services().await.context("Failed to list services")? {
        let mut characteristics = Vec::new();
        for characteristic in service.characteristics().await? {
            let flags = characteristic.flags().await?;
            let value = if read_values && flags.iter().any(|f| f == "read") {
                match characteristic.read().await {
                    Ok(data) => Some(format_hex(&data)),
                    Err(e) => {
                        debug!("Read of {} failed: {}", characteristic.uuid(), e);
                        Some(format!("<{}>", e))
                    }
                }
            } else {
                None
            };
            characteristics.push(CharacteristicEntry {
                uuid: characteristic.uuid(),
                name: uuids::describe(&characteristic.uuid()),
                flags,
                value,
            });
        }
        services.push(ServiceEntry {
            uuid: service.uuid(),
            name: uuids::describe(&service.uuid()),
            characteristics,
        });
    }

    Ok(ServiceTree {
        device: device.name().to_string(),
        address: device.address().to_string(),
        services,
    })
}
