#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Enrichment pipeline configuration types.
//!
//! Defines the TOML schema describing the area of interest and the set of
//! region layers each collision is attributed to.

use std::path::PathBuf;

use collision_map_collision_models::RegionIdKind;
use serde::{Deserialize, Serialize};

/// `chrono` format of the joined `"<date> <time>"` source fields.
pub const DEFAULT_DATETIME_FORMAT: &str = "%m/%d/%Y %H:%M";

fn default_datetime_format() -> String {
    DEFAULT_DATETIME_FORMAT.to_string()
}

/// Full configuration for one enrichment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// Format used to parse `"<date> <time>"`.
    #[serde(default = "default_datetime_format")]
    pub datetime_format: String,
    /// Coordinates outside this box are treated as unlocated.
    pub bounding_box: BoundingBox,
    /// Region layers to attribute, in output order.
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

impl EnrichConfig {
    /// Returns the names of all configured layers.
    #[must_use]
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name.as_str()).collect()
    }
}

/// Rectangular area of interest in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum longitude.
    pub west: f64,
    /// Maximum longitude.
    pub east: f64,
    /// Minimum latitude.
    pub south: f64,
    /// Maximum latitude.
    pub north: f64,
}

impl BoundingBox {
    /// Whether the coordinate lies inside the box (edges included).
    ///
    /// `NaN` coordinates are never inside.
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.west..=self.east).contains(&longitude) && (self.south..=self.north).contains(&latitude)
    }
}

/// One region layer to attribute collisions to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Output field name (e.g. `"precinct"`).
    pub name: String,
    /// Path to a `GeoJSON` `FeatureCollection`, relative to the run's base
    /// directory unless absolute.
    pub path: PathBuf,
    /// Feature property holding the region identifier.
    pub id_property: String,
    /// How to read the identifier property.
    #[serde(default)]
    pub id_kind: RegionIdKind,
}
