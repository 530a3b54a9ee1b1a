use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    pub page_size: usize,
    pub search_debounce_ms: u64,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub preferences_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".into(),
            page_size: 10,
            search_debounce_ms: 500,
            request_timeout_secs: 15,
            preferences_path: None,
        }
    }
}

impl Settings {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Defaults, then `inventory.toml` in the working directory (or the explicit
/// `--config` file, which must exist), then `INVENTORY__*` variables.
pub fn load_settings(file: Option<&Path>) -> anyhow::Result<Settings> {
    build_settings(file, environment())
}

fn environment() -> Environment {
    Environment::with_prefix("INVENTORY")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn build_settings(file: Option<&Path>, env: Environment) -> anyhow::Result<Settings> {
    let defaults = Settings::default();
    let file_source = match file {
        Some(path) => File::from(path).required(true),
        None => File::with_name("inventory").required(false),
    };

    let settings = Config::builder()
        .set_default("api_base_url", defaults.api_base_url)?
        .set_default("page_size", defaults.page_size as i64)?
        .set_default("search_debounce_ms", defaults.search_debounce_ms as i64)?
        .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
        .add_source(file_source)
        .add_source(env)
        .build()
        .context("failed to load settings")?;

    let settings: Settings = settings
        .try_deserialize()
        .context("invalid settings")?;
    if settings.page_size == 0 {
        anyhow::bail!("page_size must be greater than zero");
    }
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
