//! Command-line interface for the TI SensorTag CC2650.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scan` | List nearby BLE peripherals |
//! | `services` | Dump the GATT tree of a device |
//! | `read` | Enable sensors and read each once |
//! | `snapshot` | Read the combined environment snapshot |
//! | `watch` | Stream one sensor's notifications |
//! | `config` | Manage CLI configuration |
//!
//! Configuration lives in `config.toml` under the platform config directory
//! (`~/.config/sensortag/` on Linux). Command flags and `SENSORTAG_DEVICE`
//! override it.

mod cli;
mod commands;
mod config;
mod format;
mod util;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sensortag_core::{ConnectionConfig, GattClient};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::{ReadArgs, WatchArgs};
use crate::config::{
    Config, connection_config, device_connection_config, resolve_device, resolve_format,
};
use crate::format::FormatOptions;
use crate::util::write_output;

async fn bluetooth_client(config: ConnectionConfig) -> Result<GattClient> {
    GattClient::bluetooth(config)
        .await
        .context("Failed to open the Bluetooth adapter")
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let opts = FormatOptions::new(cli.no_color || config.no_color).with_compact(cli.compact);
    let output = cli.output.as_ref();

    match cli.command {
        Commands::Scan { timeout, format } => {
            let format = resolve_format(cli.json, format, &config);
            let client = bluetooth_client(connection_config(&config, timeout, None)?).await?;
            commands::cmd_scan(&client, format, output, cli.quiet, &opts).await
        }
        Commands::Services {
            device,
            values,
            format,
        } => {
            let format = resolve_format(cli.json, format, &config);
            let filter = resolve_device(device.device.as_deref(), &config);
            let client = bluetooth_client(device_connection_config(&device, &config)?).await?;
            commands::cmd_services(&client, &filter, values, format, output, &opts).await
        }
        Commands::Read {
            device,
            sensors,
            no_battery,
            settle_ms,
            format,
        } => {
            let format = resolve_format(cli.json, format, &config);
            let filter = resolve_device(device.device.as_deref(), &config);
            let client = bluetooth_client(device_connection_config(&device, &config)?).await?;
            let args = ReadArgs {
                filter: &filter,
                sensors: &sensors,
                battery: !no_battery,
                settle: Duration::from_millis(settle_ms),
                format,
                output,
                opts: &opts,
            };
            commands::cmd_read(&client, args).await
        }
        Commands::Snapshot {
            device,
            settle_ms,
            format,
        } => {
            let format = resolve_format(cli.json, format, &config);
            let filter = resolve_device(device.device.as_deref(), &config);
            let client = bluetooth_client(device_connection_config(&device, &config)?).await?;
            commands::cmd_snapshot(
                &client,
                &filter,
                Duration::from_millis(settle_ms),
                format,
                output,
                &opts,
            )
            .await
        }
        Commands::Watch {
            device,
            sensor,
            count,
            format,
        } => {
            let format = resolve_format(cli.json, format, &config);
            let filter = resolve_device(device.device.as_deref(), &config);
            let client = bluetooth_client(device_connection_config(&device, &config)?).await?;
            let args = WatchArgs {
                filter: &filter,
                sensor,
                count,
                format,
                output,
                quiet: cli.quiet,
                opts: &opts,
            };
            commands::cmd_watch(&client, args, ctrl_c()).await
        }
        Commands::Config { action } => {
            let content = commands::cmd_config(action, &Config::path())?;
            write_output(output, &content)
        }
    }
}
