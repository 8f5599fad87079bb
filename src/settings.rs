use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

const DEFAULT_DB_PATH: &str = "data/catalog.sqlite";

/// Runtime settings: `catalog.toml` in the working directory, then
/// `CATALOG_*` environment variables (`CATALOG_DB_PATH`, `CATALOG_STRICT_UNITS`, ...).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: PathBuf,
    /// Reject lengths without a unit instead of reading them as millimeters.
    pub strict_units: bool,
    /// Records echoed in the ingestion report.
    pub sample_size: usize,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            strict_units: false,
            sample_size: 3,
            user_agent: concat!("target_catalog/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

pub fn load() -> Result<Settings> {
    let settings = Config::builder()
        .add_source(File::with_name("catalog").required(false))
        .add_source(Environment::with_prefix("CATALOG").try_parsing(true))
        .build()
        .context("Failed to read settings")?
        .try_deserialize()
        .context("Invalid settings")?;
    Ok(settings)
}
