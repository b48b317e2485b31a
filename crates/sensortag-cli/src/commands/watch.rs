//! Watch command implementation.
//!
//! Subscribes to one sensor's notifications and prints each decoded sample
//! until the requested count is reached, the device goes away, or the
//! shutdown future resolves (Ctrl+C in the binary).

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use owo_colors::OwoColorize;
use sensortag_core::{GattClient, SensorTag};
use sensortag_types::SensorKind;
use time::OffsetDateTime;
use tracing::warn;

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_watch_line};
use crate::util::{connect_tag, open_output};

/// Arguments for the watch command.
pub struct WatchArgs<'a> {
    pub filter: &'a str,
    pub sensor: SensorKind,
    /// Stop after this many samples; 0 for unlimited.
    pub count: u32,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
}

pub async fn cmd_watch<S>(client: &GattClient, args: WatchArgs<'_>, shutdown: S) -> Result<()>
where
    S: Future<Output = ()>,
{
    let tag = connect_tag(client, args.filter).await?;
    let result = watch(&tag, &args, shutdown).await;
    if let Err(e) = tag.disconnect().await {
        warn!("Disconnect from {} failed: {}", tag.name(), e);
    }
    result
}

async fn watch<S>(tag: &SensorTag, args: &WatchArgs<'_>, shutdown: S) -> Result<()>
where
    S: Future<Output = ()>,
{
    let WatchArgs {
        sensor,
        count,
        format,
        output,
        quiet,
        opts,
        ..
    } = *args;

    tag.enable(sensor)
        .await
        .with_context(|| format!("Failed to enable {}", sensor))?;
    let mut stream = tag
        .stream(sensor)
        .await
        .with_context(|| format!("Failed to subscribe to {}", sensor))?;
    let mut out = open_output(output)?;

    if !quiet {
        let header = if opts.no_color {
            format!("Watching: {} on {}", sensor, tag.name())
        } else {
            format!("Watching: {} on {}", sensor.cyan(), tag.name().green())
        };
        eprintln!("{}", header);
        if count > 0 {
            eprintln!("Count: {} | Press Ctrl+C to stop", count);
        } else {
            eprintln!("Press Ctrl+C to stop");
        }
        eprintln!("{}", "-".repeat(50));
    }

    let json = format == OutputFormat::Json;
    let mut taken: u32 = 0;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if !quiet {
                    eprintln!("\nShutting down...");
                }
                break;
            }
            item = stream.next() => match item {
                Some(Ok(measurement)) => {
                    let line =
                        format_watch_line(&measurement, OffsetDateTime::now_utc(), json, opts)?;
                    out.write_all(line.as_bytes())?;
                    out.flush()?;
                    taken += 1;
                    if count > 0 && taken >= count {
                        if !quiet {
                            eprintln!("Completed {} readings.", taken);
                        }
                        break;
                    }
                }
                Some(Err(e)) => warn!("Skipping undecodable {} sample: {}", sensor, e),
                None => bail!("Notifications from {} ended; the device disconnected", tag.name()),
            }
        }
    }

    stream.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sensortag_core::mock::samples;
    use sensortag_types::uuids;

    use super::*;
    use crate::commands::test_support::{TAG_ADDRESS, mock_client};

    fn args<'a>(output: &'a PathBuf, count: u32, opts: &'a FormatOptions) -> WatchArgs<'a> {
        WatchArgs {
            filter: "CC2650",
            sensor: SensorKind::Luxometer,
            count,
            format: OutputFormat::Json,
            output: Some(output),
            quiet: true,
            opts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_stops_after_count() {
        let (transport, client) = mock_client();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.jsonl");
        let opts = FormatOptions::new(true);

        let feeder = {
            let transport = transport.clone();
            async move {
                while !transport.is_notifying(TAG_ADDRESS, uuids::LUXOMETER_DATA).await {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                transport
                    .notify(TAG_ADDRESS, uuids::LUXOMETER_DATA, &samples::LUXOMETER)
                    .await;
                // Too short to decode; skipped without ending the watch.
                transport.notify(TAG_ADDRESS, uuids::LUXOMETER_DATA, &[0x01]).await;
                transport
                    .notify(TAG_ADDRESS, uuids::LUXOMETER_DATA, &[0x64, 0x10])
                    .await;
            }
        };

        let (result, _) = tokio::join!(
            cmd_watch(&client, args(&path, 2, &opts), std::future::pending()),
            feeder
        );
        result.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["lux"], 16.0);
        assert_eq!(lines[1]["lux"], 2.0);
        assert!(!transport.is_notifying(TAG_ADDRESS, uuids::LUXOMETER_DATA).await);
        assert!(!transport.is_connected(TAG_ADDRESS).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_shutdown_signal() {
        let (transport, client) = mock_client();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.jsonl");
        let opts = FormatOptions::new(true);

        let shutdown = tokio::time::sleep(Duration::from_secs(5));
        cmd_watch(&client, args(&path, 0, &opts), shutdown)
            .await
            .unwrap();

        assert!(std::fs::read_to_string(&path).unwrap().is_empty());
        assert!(!transport.is_connected(TAG_ADDRESS).await);
    }
}
