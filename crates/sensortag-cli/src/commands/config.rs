//! Config command implementation.

use std::path::Path;

use anyhow::{Result, bail};

use crate::cli::ConfigAction;
use crate::config::Config;

/// Apply `action` to the config file at `path`, returning what to print.
pub fn cmd_config(action: ConfigAction, path: &Path) -> Result<String> {
    match action {
        ConfigAction::Show => {
            let config = Config::load_from(path);
            Ok(toml::to_string_pretty(&config)?)
        }
        ConfigAction::Get { key } => {
            let config = Config::load_from(path);
            Ok(match config.get(key) {
                Some(value) => format!("{}\n", value),
                None => "(not set)\n".to_string(),
            })
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load_from(path);
            config.set(key, &value)?;
            config.save_to(path)?;
            Ok(format!("Set {:?} = {}\n", key, value))
        }
        ConfigAction::Unset { key } => {
            let mut config = Config::load_from(path);
            config.unset(key);
            config.save_to(path)?;
            Ok(format!("Unset {:?}\n", key))
        }
        ConfigAction::Path => Ok(format!("{}\n", path.display())),
        ConfigAction::Init => {
            if path.exists() {
                bail!("Config file already exists: {}", path.display());
            }
            Config::default().save_to(path)?;
            Ok(format!("Created {}\n", path.display()))
        }
    }
}
