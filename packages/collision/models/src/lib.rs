#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collision record types shared across the collision-map workspace.
//!
//! Ingestion produces [`CollisionRecord`] values; the enrichment pipeline
//! turns each one into an [`EnrichedCollision`] carrying derived totals,
//! flags, a [`Season`], and one [`RegionId`] slot per configured region
//! layer.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Day-of-year on which each season interval starts in a common year.
///
/// The trailing entry closes the final interval, which wraps back onto
/// winter.
const SEASON_STARTS: [u32; 6] = [1, 80, 172, 264, 355, 365];

/// Same as [`SEASON_STARTS`], shifted by the extra day of February.
const LEAP_YEAR_SEASON_STARTS: [u32; 6] = [1, 81, 173, 265, 356, 366];

/// Season assigned to each interval of [`SEASON_STARTS`].
const SEASON_INTERVALS: [Season; 5] = [
    Season::Winter,
    Season::Spring,
    Season::Summer,
    Season::Fall,
    Season::Winter,
];

/// Meteorological-style season bucket for a calendar date.
///
/// Seasons begin on (roughly) the 21st of March, June, September and
/// December; the boundary day belongs to the season it starts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Season {
    /// December 21st through March 20th.
    Winter,
    /// March 21st through June 20th.
    Spring,
    /// June 21st through September 20th.
    Summer,
    /// September 21st through December 20th.
    Fall,
}

impl Season {
    /// Classifies a calendar date into its season.
    ///
    /// Leap years shift every boundary after February by one day so the
    /// civil-calendar start dates stay fixed.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        let starts = if is_leap_year(date.year()) {
            &LEAP_YEAR_SEASON_STARTS
        } else {
            &SEASON_STARTS
        };
        let day = date.ordinal();
        let interval = starts
            .partition_point(|&start| start <= day)
            .saturating_sub(1);

        SEASON_INTERVALS[interval % SEASON_INTERVALS.len()]
    }

    /// Returns all variants of this enum in calendar order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Winter, Self::Spring, Self::Summer, Self::Fall]
    }
}

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// Identifier of a region within one region layer.
///
/// Police precincts are numbered while other layers use names, so a layer
/// decides which form it produces via [`RegionIdKind`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionId {
    /// Numeric identifier (e.g. precinct `14`).
    Number(i64),
    /// Textual identifier (e.g. a neighborhood name).
    Name(String),
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Name(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RegionId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RegionId {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for RegionId {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

/// How a region layer's identifier property is read.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegionIdKind {
    /// Integer identifiers; numeric strings are accepted and parsed.
    Integer,
    /// Free-form string identifiers.
    #[default]
    Text,
}

/// Per-category casualty counts as reported by the source.
///
/// Any count may be missing; totals treat a missing count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CasualtyCounts {
    /// Pedestrians affected.
    pub pedestrians: Option<u32>,
    /// Cyclists affected.
    pub cyclists: Option<u32>,
    /// Motor vehicle occupants affected.
    pub motorists: Option<u32>,
}

impl CasualtyCounts {
    /// Sum of all categories, counting missing values as zero.
    ///
    /// Summed as `u64` so three `u32` counts can never overflow.
    #[must_use]
    pub fn total(&self) -> u64 {
        [self.pedestrians, self.cyclists, self.motorists]
            .into_iter()
            .map(|count| u64::from(count.unwrap_or(0)))
            .sum()
    }

    /// Whether at least one pedestrian is counted.
    #[must_use]
    pub fn any_pedestrians(&self) -> bool {
        self.pedestrians.unwrap_or(0) > 0
    }

    /// Whether at least one cyclist is counted.
    #[must_use]
    pub fn any_cyclists(&self) -> bool {
        self.cyclists.unwrap_or(0) > 0
    }
}

/// A raw collision report as produced by ingestion.
///
/// Date and time are kept as the source strings; the enrichment pipeline
/// parses them so a malformed value can be reported against the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionRecord {
    /// Unique collision identifier from the source.
    pub id: i64,
    /// Date string (e.g. `"06/30/2024"`).
    pub date: String,
    /// Time-of-day string (e.g. `"14:05"`).
    pub time: String,
    /// Latitude (WGS84). `None` if the source lacks coordinates.
    pub latitude: Option<f64>,
    /// Longitude (WGS84). `None` if the source lacks coordinates.
    pub longitude: Option<f64>,
    /// Injury counts by road-user category.
    pub injured: CasualtyCounts,
    /// Fatality counts by road-user category.
    pub killed: CasualtyCounts,
}

/// A collision after enrichment, ready for persistence and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedCollision {
    /// Unique collision identifier from the source.
    pub id: i64,
    /// Combined date and time of the collision (local time).
    pub occurred_at: NaiveDateTime,
    /// Latitude (WGS84), as reported.
    pub latitude: Option<f64>,
    /// Longitude (WGS84), as reported.
    pub longitude: Option<f64>,
    /// Injury counts by road-user category.
    pub injured: CasualtyCounts,
    /// Fatality counts by road-user category.
    pub killed: CasualtyCounts,
    /// Sum of [`Self::injured`].
    pub total_injured: u64,
    /// Sum of [`Self::killed`].
    pub total_killed: u64,
    /// Season of [`Self::occurred_at`].
    pub season: Season,
    /// Both coordinates present and inside the configured bounding box.
    pub valid_location: bool,
    /// Anyone injured or killed.
    pub serious: bool,
    /// A pedestrian or cyclist was injured or killed.
    pub non_motorist: bool,
    /// A cyclist was injured or killed.
    pub cyclist: bool,
    /// A pedestrian was injured or killed.
    pub pedestrian: bool,
    /// Region assignment keyed by layer name. `None` when unassigned.
    pub regions: BTreeMap<String, Option<RegionId>>,
}

impl EnrichedCollision {
    /// Returns the region assigned for `layer`, if any.
    #[must_use]
    pub fn region(&self, layer: &str) -> Option<&RegionId> {
        self.regions.get(layer).and_then(Option::as_ref)
    }
}
