//! Utility functions for CLI operations.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use sensortag_core::{ErrorKind, GattClient, SensorTag};

/// Write a rendered document to the output file or stdout.
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}

/// Open a sink for line-by-line output.
pub fn open_output(output: Option<&PathBuf>) -> Result<Box<dyn Write + Send>> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout())),
    }
}

/// Discover and connect to the first device matching `filter`, with a hint
/// when nothing matched.
pub async fn connect_tag(client: &GattClient, filter: &str) -> Result<SensorTag> {
    match SensorTag::connect(client, filter).await {
        Ok(tag) => Ok(tag),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(anyhow::Error::new(e).context(format!(
            "No device matching '{}'. Make sure the SensorTag is advertising \
             (press its power button) and run 'sensortag scan' to list nearby devices.",
            filter
        ))),
        Err(e) => {
            Err(anyhow::Error::new(e).context(format!("Failed to connect to '{}'", filter)))
        }
    }
}
