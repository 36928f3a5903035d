//! Loads region layers from `GeoJSON` `FeatureCollection` documents.
//!
//! Each feature becomes one [`Region`]: the identifier comes from a named
//! property and the geometry must be a `Polygon` or `MultiPolygon`.

use std::path::Path;

use collision_map_collision_models::{RegionId, RegionIdKind};
use geojson::{Feature, GeoJson, JsonValue};

use crate::{Region, SpatialError};

/// Reads a `GeoJSON` file and converts its features into regions.
///
/// # Errors
///
/// Returns [`SpatialError`] if the file cannot be read or any feature
/// lacks a usable identifier or polygonal geometry.
pub fn load_geojson_layer(
    path: &Path,
    id_property: &str,
    id_kind: RegionIdKind,
) -> Result<Vec<Region>, SpatialError> {
    let document = std::fs::read_to_string(path)?;
    let regions = parse_geojson_layer(&document, id_property, id_kind)?;
    log::info!(
        "Read {} region features from {}",
        regions.len(),
        path.display()
    );
    Ok(regions)
}

/// Converts an in-memory `GeoJSON` document into regions.
///
/// # Errors
///
/// Returns [`SpatialError`] if the document is not a `FeatureCollection`
/// or any feature lacks a usable identifier or polygonal geometry.
pub fn parse_geojson_layer(
    document: &str,
    id_property: &str,
    id_kind: RegionIdKind,
) -> Result<Vec<Region>, SpatialError> {
    let GeoJson::FeatureCollection(collection) = document.parse::<GeoJson>()? else {
        return Err(SpatialError::NotAFeatureCollection);
    };

    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| region_from_feature(index, feature, id_property, id_kind))
        .collect()
}

fn region_from_feature(
    index: usize,
    feature: Feature,
    id_property: &str,
    id_kind: RegionIdKind,
) -> Result<Region, SpatialError> {
    let id = feature
        .property(id_property)
        .and_then(|value| region_id_from_value(value, id_kind))
        .ok_or_else(|| SpatialError::InvalidFeature {
            index,
            message: format!("missing or unreadable {id_kind} property '{id_property}'"),
        })?;

    let Some(geometry) = feature.geometry else {
        return Err(SpatialError::InvalidFeature {
            index,
            message: format!("region {id} has no geometry"),
        });
    };

    let geometry: geo::Geometry<f64> = geometry.try_into()?;
    let boundary = match geometry {
        geo::Geometry::MultiPolygon(mp) => mp,
        geo::Geometry::Polygon(p) => geo::MultiPolygon(vec![p]),
        other => {
            return Err(SpatialError::UnsupportedGeometry {
                index,
                kind: geometry_kind(&other),
            });
        }
    };

    Ok(Region { id, boundary })
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn region_id_from_value(value: &JsonValue, kind: RegionIdKind) -> Option<RegionId> {
    match kind {
        RegionIdKind::Integer => match value {
            JsonValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            JsonValue::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .map(RegionId::Number),
        RegionIdKind::Text => match value {
            JsonValue::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        }
        .map(RegionId::Name),
    }
}

const fn geometry_kind(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}
