pub mod active;
pub mod check_config;
pub mod overview;
pub mod sync;

use anyhow::Context;
use iim_core::config::{FileConfig, Settings};
use iim_core::fields::FieldValue;
use std::path::Path;

/// File settings plus environment, resolved before any tracker call.
pub fn load_settings(config: Option<&Path>) -> anyhow::Result<Settings> {
    let file = FileConfig::discover(config).context("failed to load settings file")?;
    for w in file.validate() {
        tracing::warn!("{}", w.message);
    }
    let settings = Settings::from_env(&file).context("invalid configuration")?;
    tracing::debug!(?settings, "settings resolved");
    Ok(settings)
}

/// Human form of a field value; blank values show as `(empty)`.
pub fn show(value: &FieldValue) -> String {
    if value.is_empty() {
        "(empty)".to_string()
    } else {
        value.to_string()
    }
}
