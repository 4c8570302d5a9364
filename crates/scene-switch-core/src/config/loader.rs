//! Configuration file loading and creation

use super::types::Config;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A value is present but out of range
    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// Load the configuration, creating the file with defaults when it is missing.
///
/// This never fails: any error while creating, reading, parsing or validating
/// the file is logged and the in-memory defaults are returned.
pub fn load_or_create(path: &Path) -> Config {
    if !path.exists() {
        info!(
            "Configuration file not found, creating one at {}",
            path.display()
        );
        if let Err(e) = write_default_config(path) {
            error!("Failed to create configuration file: {e}");
            return Config::default();
        }
    }

    match load_config_file(path) {
        Ok(config) => {
            info!("Configuration loaded from {}", path.display());
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}. Using defaults.");
            Config::default()
        }
    }
}

/// Read, parse and validate a configuration file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid TOML, or fails
/// [`Config::validate`].
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Write [`Config::default`] to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if serialization or any filesystem operation fails.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, contents)?;
    Ok(())
}
