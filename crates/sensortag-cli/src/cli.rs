//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sensortag_types::SensorKind;

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        }
    }
}

/// Reusable device selection arguments
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Name fragment of the device to connect to, or use SENSORTAG_DEVICE env var
    #[arg(short, long, env = "SENSORTAG_DEVICE")]
    pub device: Option<String>,

    /// Seconds to wait for services to resolve after connecting (0 waits forever)
    #[arg(short = 'T', long)]
    pub timeout: Option<u64>,

    /// Discovery window in seconds
    #[arg(long)]
    pub scan_timeout: Option<u64>,
}

#[derive(Parser)]
#[command(name = "sensortag")]
#[command(author, version, about = "CLI for the TI SensorTag CC2650", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON (shorthand for --format json)
    #[arg(long, global = true)]
    pub json: bool,

    /// Output compact JSON (no pretty-printing)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan for nearby BLE peripherals
    Scan {
        /// Scan timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// List the services and characteristics of a device
    Services {
        #[command(flatten)]
        device: DeviceArgs,

        /// Read and show the value of every readable characteristic
        #[arg(long)]
        values: bool,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Enable sensors and read each one once
    Read {
        #[command(flatten)]
        device: DeviceArgs,

        /// Sensors to read (default: all)
        #[arg(value_parser = parse_sensor)]
        sensors: Vec<SensorKind>,

        /// Skip the battery level
        #[arg(long)]
        no_battery: bool,

        /// Milliseconds to wait after enabling before the first read
        #[arg(long, default_value = "1000")]
        settle_ms: u64,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Read the combined environment snapshot (temperatures, humidity, pressure, light)
    Snapshot {
        #[command(flatten)]
        device: DeviceArgs,

        /// Milliseconds to wait after enabling before reading
        #[arg(long, default_value = "1000")]
        settle_ms: u64,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Stream notifications from one sensor until interrupted
    Watch {
        #[command(flatten)]
        device: DeviceArgs,

        /// Sensor to watch
        #[arg(value_parser = parse_sensor)]
        sensor: SensorKind,

        /// Number of readings to take before exiting (0 for unlimited)
        #[arg(short = 'n', long, default_value = "0")]
        count: u32,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Parse a sensor name, accepting the short aliases `SensorKind` understands
fn parse_sensor(s: &str) -> Result<SensorKind, String> {
    s.parse::<SensorKind>().map_err(|_| {
        let valid: Vec<_> = SensorKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("Unknown sensor '{}'. Valid sensors: {}", s, valid.join(", "))
    })
}

/// Configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Default device name filter
    Device,
    /// Default output format
    Format,
    /// Discovery window in seconds
    ScanTimeout,
    /// Service resolution timeout in seconds (0 waits forever)
    ResolutionTimeout,
    /// Interval between resolution polls in milliseconds
    PollInterval,
    /// Disable colored output
    NoColor,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Configuration value
        value: String,
    },

    /// Unset (remove) a configuration value
    Unset {
        /// Configuration key to remove
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sensor_aliases() {
        assert_eq!(parse_sensor("lux"), Ok(SensorKind::Luxometer));
        assert_eq!(parse_sensor("IR"), Ok(SensorKind::IrTemperature));
        let err = parse_sensor("gps").unwrap_err();
        assert!(err.contains("luxometer"));
    }

    #[test]
    fn test_read_accepts_multiple_sensors() {
        let cli = Cli::try_parse_from(["sensortag", "read", "humidity", "lux", "--no-battery"])
            .unwrap();
        match cli.command {
            Commands::Read {
                sensors, no_battery, ..
            } => {
                assert_eq!(sensors, vec![SensorKind::Humidity, SensorKind::Luxometer]);
                assert!(no_battery);
            }
            _ => panic!("expected read command"),
        }
    }

    #[test]
    fn test_watch_requires_sensor() {
        assert!(Cli::try_parse_from(["sensortag", "watch"]).is_err());
        let cli = Cli::try_parse_from(["sensortag", "watch", "movement", "-n", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Watch {
                sensor: SensorKind::Movement,
                count: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["sensortag", "scan", "--json", "-q"]).unwrap();
        assert!(cli.json);
        assert!(cli.quiet);
    }
}
