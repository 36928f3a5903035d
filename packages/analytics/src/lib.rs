#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation helpers over enriched collisions.
//!
//! These feed the reporting layer: day-of-week by hour cross-tabs, a
//! shared colour scale across several cross-tabs, min/max scaling,
//! frequency tables and per-column distribution profiles.

pub mod crosstab;
pub mod distribution;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use crosstab::{Aggregation, WeekCrosstab, crosstab_min_max};
pub use distribution::{DistributionStats, distribution_stats};

/// One row of a frequency table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyRow {
    /// Value being counted.
    pub label: String,
    /// Number of occurrences.
    pub count: u64,
    /// Share of all occurrences, 0-100.
    pub percent: f64,
}

/// Counts occurrences of each value.
///
/// Rows are sorted by descending count, then by label.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn frequency_table<I, S>(values: I) -> Vec<FrequencyRow>
where
    I: IntoIterator<Item = S>,
    S: ToString,
{
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for value in values {
        *counts.entry(value.to_string()).or_default() += 1;
    }

    let total: u64 = counts.values().sum();
    let mut rows: Vec<FrequencyRow> = counts
        .into_iter()
        .map(|(label, count)| FrequencyRow {
            label,
            count,
            percent: count as f64 * 100.0 / total as f64,
        })
        .collect();

    // BTreeMap order is by label; a stable sort keeps it for equal counts.
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

/// Rescales `values` linearly onto `[0, 1]`.
///
/// Non-finite values are ignored when finding the range and come back as
/// `NaN`. If every finite value is equal, they all map to `0`.
#[must_use]
pub fn min_max_scale(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    values
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                f64::NAN
            } else if range > 0.0 {
                (v - min) / range
            } else {
                0.0
            }
        })
        .collect()
}
