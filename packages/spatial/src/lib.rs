#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for region attribution.
//!
//! Each region layer (police precincts, council districts, ...) is loaded
//! once, bulk-loaded into an R-tree, and then queried read-only for the
//! nearest region to every collision point. Points inside a polygon are
//! at distance zero from it, so containment and nearest-distance lookups
//! are the same query.

pub mod geojson_layer;
pub mod join;

use std::collections::BTreeSet;

use collision_map_collision_models::RegionId;
use geo::{BoundingRect, Distance, Euclidean, Intersects, MultiPolygon, Point};
use rstar::{AABB, PointDistance, RTree, RTreeObject};

pub use geojson_layer::{load_geojson_layer, parse_geojson_layer};
pub use join::{LayerAssignment, Locatable, join_layer};

/// Errors that can occur while loading or building region layers.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// The layer contained no regions.
    #[error("Region layer '{layer}' has no regions")]
    EmptyLayer {
        /// Name of the offending layer.
        layer: String,
    },

    /// Two regions in one layer share an identifier.
    #[error("Region layer '{layer}' has duplicate region identifier {id}")]
    DuplicateRegion {
        /// Name of the offending layer.
        layer: String,
        /// The repeated identifier.
        id: RegionId,
    },

    /// A region's boundary has no polygons.
    #[error("Region {id} in layer '{layer}' has an empty boundary")]
    EmptyBoundary {
        /// Name of the offending layer.
        layer: String,
        /// Identifier of the empty region.
        id: RegionId,
    },

    /// I/O error reading a layer file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The layer document is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(Box<geojson::Error>),

    /// The layer document is valid `GeoJSON` but not a `FeatureCollection`.
    #[error("GeoJSON layer is not a FeatureCollection")]
    NotAFeatureCollection,

    /// A feature lacks a usable identifier or geometry.
    #[error("Invalid feature {index}: {message}")]
    InvalidFeature {
        /// Position of the feature within the collection.
        index: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// A feature's geometry is not a polygon or multipolygon.
    #[error("Feature {index} has unsupported geometry type {kind}")]
    UnsupportedGeometry {
        /// Position of the feature within the collection.
        index: usize,
        /// The geometry type that was found.
        kind: &'static str,
    },
}

impl From<geojson::Error> for SpatialError {
    fn from(e: geojson::Error) -> Self {
        Self::GeoJson(Box::new(e))
    }
}

/// One named polygon of a region layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Identifier, unique within its layer.
    pub id: RegionId,
    /// Boundary in the layer's coordinate reference system (x = longitude).
    pub boundary: MultiPolygon<f64>,
}

impl Region {
    /// Creates a region from anything convertible into a [`MultiPolygon`],
    /// including a single [`geo::Polygon`].
    #[must_use]
    pub fn new(id: impl Into<RegionId>, boundary: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            id: id.into(),
            boundary: boundary.into(),
        }
    }
}

/// A region stored in the R-tree along with its build position.
struct RegionEntry {
    ordinal: usize,
    id: RegionId,
    envelope: AABB<[f64; 2]>,
    boundary: MultiPolygon<f64>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for RegionEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let point = Point::new(point[0], point[1]);
        if self.boundary.intersects(&point) {
            return 0.0;
        }

        let distance = self
            .boundary
            .0
            .iter()
            .map(|polygon| Euclidean.distance(&point, polygon))
            .fold(f64::INFINITY, f64::min);

        distance * distance
    }
}

/// Outcome of a nearest-region query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionMatch<'a> {
    /// The nearest region's identifier.
    Found(&'a RegionId),
    /// The point was missing or not finite, so no query was issued.
    NotFound,
}

impl<'a> RegionMatch<'a> {
    /// Returns the matched identifier, if any.
    #[must_use]
    pub const fn region(self) -> Option<&'a RegionId> {
        match self {
            Self::Found(id) => Some(id),
            Self::NotFound => None,
        }
    }
}

/// Immutable R-tree over one region layer.
///
/// Built once per run and shared read-only across join workers.
pub struct RegionIndex {
    layer: String,
    tree: RTree<RegionEntry>,
}

impl RegionIndex {
    /// Bulk-loads `regions` into an R-tree.
    ///
    /// The order of `regions` is remembered: when several regions are
    /// exactly equidistant from a query point, the earliest one wins.
    ///
    /// # Errors
    ///
    /// * [`SpatialError::EmptyLayer`] if `regions` is empty
    /// * [`SpatialError::DuplicateRegion`] if two regions share an identifier
    /// * [`SpatialError::EmptyBoundary`] if a region has no polygons
    pub fn build(layer: impl Into<String>, regions: Vec<Region>) -> Result<Self, SpatialError> {
        let layer = layer.into();

        if regions.is_empty() {
            return Err(SpatialError::EmptyLayer { layer });
        }

        let mut seen = BTreeSet::new();
        let mut entries = Vec::with_capacity(regions.len());

        for (ordinal, region) in regions.into_iter().enumerate() {
            if !seen.insert(region.id.clone()) {
                return Err(SpatialError::DuplicateRegion {
                    layer,
                    id: region.id,
                });
            }

            let Some(envelope) = compute_envelope(&region.boundary) else {
                return Err(SpatialError::EmptyBoundary {
                    layer,
                    id: region.id,
                });
            };

            entries.push(RegionEntry {
                ordinal,
                id: region.id,
                envelope,
                boundary: region.boundary,
            });
        }

        let tree = RTree::bulk_load(entries);
        log::info!("Loaded {} regions into spatial index '{layer}'", tree.size());

        Ok(Self { layer, tree })
    }

    /// Name of the layer this index was built from.
    #[must_use]
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Number of regions in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the index holds no regions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Finds the region nearest to `point` (x = longitude, y = latitude).
    ///
    /// Returns [`RegionMatch::NotFound`] without touching the tree when the
    /// point is missing or has a non-finite coordinate.
    #[must_use]
    pub fn nearest_region(&self, point: Option<Point<f64>>) -> RegionMatch<'_> {
        let Some(point) = point.filter(|p| p.x().is_finite() && p.y().is_finite()) else {
            return RegionMatch::NotFound;
        };

        let query = [point.x(), point.y()];
        let mut candidates = self.tree.nearest_neighbor_iter_with_distance_2(&query);

        let Some((first, best)) = candidates.next() else {
            return RegionMatch::NotFound;
        };

        // Candidates arrive in ascending distance; scan the exact ties.
        let winner = candidates
            .take_while(|(_, distance)| *distance <= best)
            .map(|(entry, _)| entry)
            .fold(first, |current, entry| {
                if entry.ordinal < current.ordinal {
                    entry
                } else {
                    current
                }
            });

        RegionMatch::Found(&winner.id)
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
