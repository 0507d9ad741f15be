//! Subcommand implementations.

pub mod config;
pub mod nearby;
pub mod status;
pub mod submit;

use std::path::PathBuf;

use civiclens_core::CivicConfig;

/// Default config location, `<config dir>/civiclens/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("civiclens")
        .join("config.json")
}

/// Resolve the config file: the `--config` argument, else the default location.
pub fn config_path(explicit: Option<&str>) -> PathBuf {
    explicit.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load configuration, falling back to defaults when no file exists.
///
/// An explicit `--config` path must exist.
pub fn load_config(explicit: Option<&str>) -> anyhow::Result<CivicConfig> {
    let path = config_path(explicit);

    if path.exists() {
        return Ok(CivicConfig::from_file(&path)?);
    }
    if explicit.is_some() {
        anyhow::bail!("Config file not found: {}", path.display());
    }

    Ok(CivicConfig::default())
}

/// Text placeholder for absent location fields.
pub fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}
