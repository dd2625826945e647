//! Configuration loading for sources and the retry helper.
//!
//! Sources are merged with priority (lowest first):
//! 1. Default values (hardcoded)
//! 2. Explicit config file passed to [`Settings::load`]
//! 3. File named by `POLLWATCH_CONFIG_PATH`
//! 4. Environment variables (`POLLWATCH__SECTION__KEY`)
//!

mod retry;
mod source;
pub use retry::*;
pub use source::*;


//---
use std::env;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::Result;

pub const CONFIG_PATH_ENV: &str = "POLLWATCH_CONFIG_PATH";
pub const ENV_PREFIX: &str = "POLLWATCH";

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Settings {
    /// Poll loop behaviour
    #[serde(default)]
    pub source: SourceConfig,
    /// Default policy for `task_with_backoff`
    #[serde(default)]
    pub retry: BackoffPolicy,
}

impl Settings {
    /// Load configuration from multiple sources with priority:
    /// 1. Explicit file
    /// 2. `POLLWATCH_CONFIG_PATH` file
    /// 3. Environment variables
    ///
    /// # Arguments
    /// * `path` - Optional path to a TOML file; it must exist when given
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        if let Some(path) = path {
            config = config.add_source(File::with_name(path).required(true));
        }

        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            config = config.add_source(File::with_name(&path));
        }

        config = config.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.retry.validate("retry").map_err(ConfigError::Message)?;
        if let Some(policy) = &self.source.error_backoff {
            policy
                .validate("source.error_backoff")
                .map_err(ConfigError::Message)?;
        }
        Ok(())
    }
}
