//! Parallel nearest-region join of a record batch against one layer.

use std::collections::BTreeMap;

use collision_map_collision_models::{EnrichedCollision, RegionId};
use geo::Point;
use rayon::prelude::*;

use crate::{RegionIndex, SpatialError};

/// Record identifier -> assigned region for one layer.
///
/// Records that were skipped or not located are absent.
pub type LayerAssignment = BTreeMap<i64, RegionId>;

/// A record that can be placed on the map.
pub trait Locatable {
    /// Identifier the assignment is keyed by.
    fn record_id(&self) -> i64;

    /// Point in the region layer's CRS (x = longitude), if known.
    fn location(&self) -> Option<Point<f64>>;
}

impl Locatable for EnrichedCollision {
    fn record_id(&self) -> i64 {
        self.id
    }

    fn location(&self) -> Option<Point<f64>> {
        Some(Point::new(self.longitude?, self.latitude?))
    }
}

/// Assigns the nearest region of `index` to every record accepted by
/// `is_valid`.
///
/// Records are processed in parallel; the index is only read. Record
/// identifiers are expected to be unique within `records`.
///
/// # Errors
///
/// Returns [`SpatialError::EmptyLayer`] if `index` holds no regions.
pub fn join_layer<T, P>(
    records: &[T],
    index: &RegionIndex,
    is_valid: P,
) -> Result<LayerAssignment, SpatialError>
where
    T: Locatable + Sync,
    P: Fn(&T) -> bool + Sync,
{
    if index.is_empty() {
        return Err(SpatialError::EmptyLayer {
            layer: index.layer().to_string(),
        });
    }

    let assignment: LayerAssignment = records
        .par_iter()
        .filter(|record| is_valid(record))
        .filter_map(|record| {
            index
                .nearest_region(record.location())
                .region()
                .map(|id| (record.record_id(), id.clone()))
        })
        .collect();

    log::debug!(
        "Layer '{}': assigned {} of {} records",
        index.layer(),
        assignment.len(),
        records.len()
    );

    Ok(assignment)
}
