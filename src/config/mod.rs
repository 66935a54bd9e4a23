//! Layered client configuration.
//!
//! Defaults are overridden by an optional `config/default.*` file, which is in
//! turn overridden by `POPSUB_CLIENT_*` environment variables (nested keys are
//! separated by `__`, e.g. `POPSUB_CLIENT_SESSION__CONNECT_TIMEOUT_MS`).

mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{LoggingSettings, ReconnectSettings, SessionSettings, Settings};

const ENV_PREFIX: &str = "POPSUB_CLIENT";

/// Loads the configuration from the default file and environment variables
/// and merges it with default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Same as [`load_config`] but reads the file source from `path` (without extension).
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}

#[cfg(test)]
mod tests;
