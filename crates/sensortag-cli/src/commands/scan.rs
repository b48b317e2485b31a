//! Scan command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use sensortag_core::GattClient;
use tracing::info;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_scan_json, format_scan_text};
use crate::util::write_output;

pub async fn cmd_scan(
    client: &GattClient,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    if !quiet {
        info!(
            "Scanning for {:?}...",
            client.config().discovery_window
        );
    }

    let devices = client
        .discover_devices()
        .await
        .context("Failed to scan for devices")?;

    let content = match format {
        OutputFormat::Json => format_scan_json(&devices, opts)?,
        OutputFormat::Text => format_scan_text(&devices, opts),
    };

    write_output(output, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::mock_client;

    #[tokio::test(start_paused = true)]
    async fn test_scan_writes_json() {
        let (transport, client) = mock_client();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");

        cmd_scan(&client, OutputFormat::Json, Some(&path), true, &FormatOptions::new(true))
            .await
            .unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert!(!transport.is_discovering());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_failure_has_context() {
        let (transport, client) = mock_client();
        transport.set_should_fail(true, Some("adapter powered off")).await;

        let err = cmd_scan(&client, OutputFormat::Text, None, true, &FormatOptions::default())
            .await
            .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("Failed to scan"));
        assert!(message.contains("adapter powered off"));
    }
}
