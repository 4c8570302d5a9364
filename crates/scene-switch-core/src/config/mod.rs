//! Configuration loading
//!
//! The configuration lives in a single TOML file. When the file is missing it
//! is created with the documented defaults; when it cannot be read, parsed or
//! validated the in-memory defaults are used instead.

mod loader;
mod types;

pub use loader::{load_config_file, load_or_create, write_default_config, ConfigError};
pub use types::{default_pipe_name, Config, SceneBinding, DEFAULT_CONFIG_FILE};
