//! Command line arguments and settings file

mod args;
mod settings;

pub use args::{Args, Command};
pub use settings::{ConfigError, Settings, LOCAL_CONFIG_FILE};
