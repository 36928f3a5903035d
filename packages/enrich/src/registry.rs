//! Enrichment configuration sources.
//!
//! The NYC configuration is embedded at compile time; a TOML file can be
//! supplied instead, and the active layers can be narrowed with the
//! `--layers` CLI flag or the `COLLISION_MAP_LAYERS` environment variable.

use std::path::Path;

use collision_map_enrich_models::EnrichConfig;

use crate::EnrichError;

/// Environment variable listing the layers to attribute (comma-separated).
pub const LAYERS_ENV_VAR: &str = "COLLISION_MAP_LAYERS";

const DEFAULT_CONFIG: &str = include_str!("../config/nyc.toml");

/// Returns the embedded NYC configuration.
///
/// # Panics
///
/// Panics if the embedded TOML fails to parse. Since it is a compile-time
/// constant, a parse failure is a development error caught by the tests.
#[must_use]
pub fn default_config() -> EnrichConfig {
    toml::de::from_str(DEFAULT_CONFIG)
        .unwrap_or_else(|e| panic!("Failed to parse embedded enrichment config: {e}"))
}

/// Reads an enrichment configuration from a TOML file.
///
/// # Errors
///
/// Returns [`EnrichError::Io`] if the file cannot be read or
/// [`EnrichError::Toml`] if it is not a valid configuration.
pub fn load_config(path: &Path) -> Result<EnrichConfig, EnrichError> {
    let contents = std::fs::read_to_string(path)?;
    let config = toml::de::from_str(&contents)?;
    log::info!("Loaded enrichment config from {}", path.display());
    Ok(config)
}

/// Narrows `config` to the layers named by the `--layers` CLI flag or,
/// failing that, the [`LAYERS_ENV_VAR`] environment variable. If neither
/// is set, all layers are kept.
#[must_use]
pub fn enabled_layers(config: EnrichConfig, cli_filter: Option<String>) -> EnrichConfig {
    let filter = cli_filter.or_else(|| std::env::var(LAYERS_ENV_VAR).ok());
    filter_layers(config, filter.as_deref())
}

/// Keeps only the layers whose names appear in the comma-separated
/// `filter`, preserving configuration order.
#[must_use]
pub fn filter_layers(mut config: EnrichConfig, filter: Option<&str>) -> EnrichConfig {
    let Some(filter) = filter else {
        return config;
    };

    let names: Vec<&str> = filter
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let available = config.layer_names().join(", ");
    for name in &names {
        if !config.layers.iter().any(|l| l.name == *name) {
            log::warn!("Unknown region layer {name:?}. Available: {available}");
        }
    }

    config.layers.retain(|l| names.contains(&l.name.as_str()));
    config
}
