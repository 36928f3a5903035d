#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collision record enrichment.
//!
//! Turns raw [`CollisionRecord`]s into [`EnrichedCollision`]s in a single
//! batch pass: casualty totals and flags, coordinate validity, season,
//! and one nearest-region attribution per configured region layer.
//!
//! Region layers are loaded up front with [`load_layers`]; [`enrich`] then
//! runs the per-record derivation and every layer join in parallel over
//! shared, read-only inputs. Any malformed record aborts the whole run so
//! a partial dataset is never produced.

pub mod progress;
pub mod registry;

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use collision_map_collision_models::{CollisionRecord, EnrichedCollision, Season};
use collision_map_enrich_models::EnrichConfig;
use collision_map_spatial::{RegionIndex, SpatialError, join_layer, load_geojson_layer};
use rayon::prelude::*;

use crate::progress::ProgressCallback;

/// Errors that abort an enrichment run.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    /// A region layer could not be loaded, built, or queried.
    #[error("Configuration error in region layer '{layer}': {source}")]
    Configuration {
        /// Name of the offending layer.
        layer: String,
        /// Underlying spatial error.
        #[source]
        source: SpatialError,
    },

    /// A record's date/time could not be parsed.
    #[error("Malformed record {id}: cannot parse timestamp {value:?}: {source}")]
    MalformedRecord {
        /// Identifier of the offending record.
        id: i64,
        /// The joined date/time string that failed to parse.
        value: String,
        /// Underlying parse error.
        #[source]
        source: chrono::ParseError,
    },

    /// Two region layers share an output field name.
    #[error("Duplicate region layer name '{name}'")]
    DuplicateLayer {
        /// The repeated layer name.
        name: String,
    },

    /// Two input records share an identifier.
    #[error("Duplicate record identifier {id}")]
    DuplicateRecord {
        /// The repeated identifier.
        id: i64,
    },

    /// I/O error (config file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML for [`EnrichConfig`].
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A built region index together with the output field it populates.
pub struct RegionLayer {
    /// Output field name (e.g. `"precinct"`).
    pub name: String,
    /// Nearest-region index for this layer.
    pub index: RegionIndex,
}

/// Loads and indexes every layer in `config`.
///
/// Relative layer paths are resolved against `base_dir`.
///
/// # Errors
///
/// * [`EnrichError::DuplicateLayer`] if two layers share a name
/// * [`EnrichError::Configuration`] if any layer file cannot be read or
///   parsed, is empty, or contains duplicate region identifiers
pub fn load_layers(config: &EnrichConfig, base_dir: &Path) -> Result<Vec<RegionLayer>, EnrichError> {
    check_unique_layer_names(config.layers.iter().map(|layer| layer.name.as_str()))?;

    config
        .layers
        .iter()
        .map(|layer| {
            let path = base_dir.join(&layer.path);
            let index = load_geojson_layer(&path, &layer.id_property, layer.id_kind)
                .and_then(|regions| RegionIndex::build(&layer.name, regions))
                .map_err(|source| EnrichError::Configuration {
                    layer: layer.name.clone(),
                    source,
                })?;

            Ok(RegionLayer {
                name: layer.name.clone(),
                index,
            })
        })
        .collect()
}

/// Region assignments are keyed by layer name, so names must be unique.
fn check_unique_layer_names<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), EnrichError> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(EnrichError::DuplicateLayer {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Derives every non-spatial field of a record.
///
/// Region slots are created empty for each configured layer; [`enrich`]
/// fills them in.
///
/// # Errors
///
/// Returns [`EnrichError::MalformedRecord`] if `"<date> <time>"` does not
/// match the configured datetime format.
pub fn derive_record(
    record: &CollisionRecord,
    config: &EnrichConfig,
) -> Result<EnrichedCollision, EnrichError> {
    let value = format!("{} {}", record.date.trim(), record.time.trim());
    let occurred_at = match NaiveDateTime::parse_from_str(&value, &config.datetime_format) {
        Ok(dt) => dt,
        Err(source) => {
            return Err(EnrichError::MalformedRecord {
                id: record.id,
                value,
                source,
            });
        }
    };

    // Source totals can disagree with the breakdown, so always recompute.
    let total_injured = record.injured.total();
    let total_killed = record.killed.total();
    let pedestrian = record.injured.any_pedestrians() || record.killed.any_pedestrians();
    let cyclist = record.injured.any_cyclists() || record.killed.any_cyclists();

    let valid_location = match (record.latitude, record.longitude) {
        (Some(lat), Some(lng)) => config.bounding_box.contains(lat, lng),
        _ => false,
    };

    Ok(EnrichedCollision {
        id: record.id,
        occurred_at,
        latitude: record.latitude,
        longitude: record.longitude,
        injured: record.injured,
        killed: record.killed,
        total_injured,
        total_killed,
        season: Season::of(occurred_at.date()),
        valid_location,
        serious: total_injured > 0 || total_killed > 0,
        non_motorist: pedestrian || cyclist,
        cyclist,
        pedestrian,
        regions: config
            .layers
            .iter()
            .map(|layer| (layer.name.clone(), None))
            .collect(),
    })
}

/// Enriches a batch of collision records.
///
/// Output order matches input order. Only records whose coordinates fall
/// inside the configured bounding box are attributed to regions.
///
/// # Errors
///
/// * [`EnrichError::DuplicateLayer`] if two layers share a name
/// * [`EnrichError::DuplicateRecord`] if two records share an identifier
/// * [`EnrichError::MalformedRecord`] for the first record (in input
///   order) with an unparseable timestamp
/// * [`EnrichError::Configuration`] if a layer join fails
pub fn enrich(
    records: &[CollisionRecord],
    config: &EnrichConfig,
    layers: &[RegionLayer],
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<EnrichedCollision>, EnrichError> {
    let start = Instant::now();
    log::info!(
        "Enriching {} collisions across {} region layer(s)",
        records.len(),
        layers.len()
    );

    check_unique_layer_names(layers.iter().map(|layer| layer.name.as_str()))?;

    let mut seen = BTreeSet::new();
    if let Some(dupe) = records.iter().find(|r| !seen.insert(r.id)) {
        return Err(EnrichError::DuplicateRecord { id: dupe.id });
    }

    progress.set_total(layers.len() as u64 + 1);
    progress.set_message("Deriving fields".to_string());

    let derived: Vec<Result<EnrichedCollision, EnrichError>> = records
        .par_iter()
        .map(|record| derive_record(record, config))
        .collect();
    let mut enriched = derived.into_iter().collect::<Result<Vec<_>, _>>()?;
    progress.inc(1);

    let unlocated = enriched.iter().filter(|c| !c.valid_location).count();
    if unlocated > 0 {
        log::info!(
            "{unlocated} of {} collisions have missing or out-of-bounds coordinates",
            enriched.len()
        );
    }

    for layer in layers {
        progress.set_message(format!("Joining {}", layer.name));

        let assignment = join_layer(&enriched, &layer.index, |c| c.valid_location).map_err(
            |source| EnrichError::Configuration {
                layer: layer.name.clone(),
                source,
            },
        )?;

        enriched.par_iter_mut().for_each(|collision| {
            collision
                .regions
                .insert(layer.name.clone(), assignment.get(&collision.id).cloned());
        });

        log::info!(
            "{}: assigned {} of {} collisions",
            layer.name,
            assignment.len(),
            enriched.len()
        );
        progress.inc(1);
    }

    let elapsed = start.elapsed();
    progress.finish(format!("Enriched {} collisions", enriched.len()));
    log::info!(
        "Enrichment complete: {} collisions in {:.1}s",
        enriched.len(),
        elapsed.as_secs_f64()
    );

    Ok(enriched)
}

#[cfg(test)]
mod tests {
    use collision_map_collision_models::{CasualtyCounts, RegionId, RegionIdKind};
    use collision_map_enrich_models::{BoundingBox, LayerConfig};
    use collision_map_spatial::Region;
    use geo::{LineString, Polygon};

    use super::*;
    use crate::progress::null_progress;

    fn rect(west: f64, south: f64, east: f64, north: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (west, south),
                (west, north),
                (east, north),
                (east, south),
                (west, south),
            ]),
            vec![],
        )
    }

    fn nyc_config() -> EnrichConfig {
        let layer = |name: &str| LayerConfig {
            name: name.to_string(),
            path: format!("{name}.geojson").into(),
            id_property: name.to_string(),
            id_kind: RegionIdKind::Integer,
        };
        EnrichConfig {
            datetime_format: "%m/%d/%Y %H:%M".to_string(),
            bounding_box: BoundingBox {
                west: -74.30,
                east: -73.70,
                south: 40.45,
                north: 40.95,
            },
            layers: vec![layer("precinct"), layer("council_district")],
        }
    }

    fn nyc_layers() -> Vec<RegionLayer> {
        let precincts = vec![
            Region::new(1, rect(-74.05, 40.65, -73.95, 40.75)),
            Region::new(75, rect(-73.90, 40.65, -73.85, 40.70)),
        ];
        let districts = vec![Region::new(3, rect(-74.10, 40.60, -73.80, 40.90))];
        vec![
            RegionLayer {
                name: "precinct".to_string(),
                index: RegionIndex::build("precinct", precincts).unwrap(),
            },
            RegionLayer {
                name: "council_district".to_string(),
                index: RegionIndex::build("council_district", districts).unwrap(),
            },
        ]
    }

    fn record(id: i64, lat: Option<f64>, lng: Option<f64>) -> CollisionRecord {
        CollisionRecord {
            id,
            date: "06/30/2024".to_string(),
            time: "14:05".to_string(),
            latitude: lat,
            longitude: lng,
            injured: CasualtyCounts::default(),
            killed: CasualtyCounts::default(),
        }
    }

    #[test]
    fn totals_equal_sum_of_breakdown() {
        let mut raw = record(1, Some(40.70), Some(-73.99));
        raw.injured = CasualtyCounts {
            pedestrians: Some(1),
            cyclists: Some(2),
            motorists: None,
        };
        raw.killed = CasualtyCounts {
            pedestrians: None,
            cyclists: None,
            motorists: Some(1),
        };

        let enriched = derive_record(&raw, &nyc_config()).unwrap();
        assert_eq!(enriched.total_injured, 3);
        assert_eq!(enriched.total_killed, 1);
        assert!(enriched.serious);
        assert!(enriched.pedestrian);
        assert!(enriched.cyclist);
        assert!(enriched.non_motorist);
    }

    #[test]
    fn totals_hold_counts_at_u32_max() {
        let mut raw = record(1, None, None);
        raw.injured = CasualtyCounts {
            pedestrians: Some(u32::MAX),
            cyclists: Some(1),
            motorists: None,
        };

        let enriched = derive_record(&raw, &nyc_config()).unwrap();
        assert_eq!(enriched.total_injured, u64::from(u32::MAX) + 1);
        assert!(enriched.pedestrian);
        assert!(enriched.cyclist);
    }

    #[test]
    fn uninjured_motorist_collision_has_no_flags() {
        let enriched = derive_record(&record(1, None, None), &nyc_config()).unwrap();
        assert_eq!(enriched.total_injured, 0);
        assert!(!enriched.serious);
        assert!(!enriched.non_motorist);
        assert!(!enriched.cyclist);
        assert!(!enriched.pedestrian);
    }

    #[test]
    fn cyclist_fatality_sets_cyclist_flags_only() {
        let mut raw = record(1, None, None);
        raw.killed.cyclists = Some(1);
        let enriched = derive_record(&raw, &nyc_config()).unwrap();
        assert!(enriched.serious);
        assert!(enriched.cyclist);
        assert!(enriched.non_motorist);
        assert!(!enriched.pedestrian);
    }

    #[test]
    fn parses_timestamp_and_season() {
        let mut raw = record(1, None, None);
        raw.date = "12/21/2023".to_string();
        raw.time = "0:30".to_string();
        let enriched = derive_record(&raw, &nyc_config()).unwrap();
        assert_eq!(enriched.occurred_at.to_string(), "2023-12-21 00:30:00");
        assert_eq!(enriched.season, Season::Winter);

        let enriched = derive_record(&record(2, None, None), &nyc_config()).unwrap();
        assert_eq!(enriched.season, Season::Summer);
    }

    #[test]
    fn derived_record_has_empty_slot_per_layer() {
        let enriched = derive_record(&record(1, None, None), &nyc_config()).unwrap();
        assert_eq!(enriched.regions.len(), 2);
        assert!(enriched.regions.values().all(Option::is_none));
    }

    #[test]
    fn malformed_timestamp_identifies_record() {
        let mut bad = record(42, Some(40.70), Some(-73.99));
        bad.date = "2024-06-30".to_string();
        let records = vec![record(1, None, None), bad];

        let err = enrich(&records, &nyc_config(), &nyc_layers(), &null_progress()).unwrap_err();
        match err {
            EnrichError::MalformedRecord { id, value, .. } => {
                assert_eq!(id, 42);
                assert_eq!(value, "2024-06-30 14:05");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn first_malformed_record_in_input_order_is_reported() {
        let records: Vec<CollisionRecord> = (0..500)
            .map(|id| {
                let mut r = record(id, None, None);
                if id % 100 == 37 {
                    r.time = "late".to_string();
                }
                r
            })
            .collect();

        let err = enrich(&records, &nyc_config(), &[], &null_progress()).unwrap_err();
        assert!(matches!(err, EnrichError::MalformedRecord { id: 37, .. }));
    }

    #[test]
    fn duplicate_record_ids_are_rejected() {
        let records = vec![record(7, None, None), record(7, None, None)];
        let err = enrich(&records, &nyc_config(), &nyc_layers(), &null_progress()).unwrap_err();
        assert!(matches!(err, EnrichError::DuplicateRecord { id: 7 }));
    }

    #[test]
    fn duplicate_layer_names_are_rejected() {
        let layers = vec![
            RegionLayer {
                name: "precinct".to_string(),
                index: RegionIndex::build(
                    "precinct",
                    vec![Region::new(1, rect(-74.05, 40.65, -73.95, 40.75))],
                )
                .unwrap(),
            },
            RegionLayer {
                name: "precinct".to_string(),
                index: RegionIndex::build(
                    "precinct",
                    vec![Region::new(99, rect(-74.05, 40.65, -73.95, 40.75))],
                )
                .unwrap(),
            },
        ];
        let records = vec![record(1, Some(40.70), Some(-73.99))];

        let err = enrich(&records, &nyc_config(), &layers, &null_progress()).unwrap_err();
        assert!(
            matches!(err, EnrichError::DuplicateLayer { ref name } if name == "precinct"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn load_layers_rejects_duplicate_names_before_reading_files() {
        let mut config = nyc_config();
        config.layers[1].name = "precinct".to_string();

        let err = load_layers(&config, Path::new("/nonexistent")).err().unwrap();
        assert!(matches!(err, EnrichError::DuplicateLayer { ref name } if name == "precinct"));
    }

    #[test]
    fn in_bounds_record_is_attributed_to_every_layer() {
        let records = vec![record(1, Some(40.70), Some(-73.99))];
        let enriched = enrich(&records, &nyc_config(), &nyc_layers(), &null_progress()).unwrap();

        assert!(enriched[0].valid_location);
        assert_eq!(enriched[0].region("precinct"), Some(&RegionId::Number(1)));
        assert_eq!(
            enriched[0].region("council_district"),
            Some(&RegionId::Number(3))
        );
    }

    #[test]
    fn out_of_bounds_record_is_never_attributed() {
        let records = vec![
            record(1, Some(41.50), Some(-73.99)),
            record(2, None, Some(-73.99)),
            record(3, Some(f64::NAN), Some(-73.99)),
        ];
        let enriched = enrich(&records, &nyc_config(), &nyc_layers(), &null_progress()).unwrap();

        for collision in &enriched {
            assert!(!collision.valid_location, "record {}", collision.id);
            assert_eq!(collision.regions.len(), 2);
            assert!(
                collision.regions.values().all(Option::is_none),
                "record {} was attributed",
                collision.id
            );
        }
    }

    #[test]
    fn in_bounds_point_outside_polygons_gets_nearest_region() {
        // East of precinct 75, inside the bounding box.
        let records = vec![record(1, Some(40.68), Some(-73.80))];
        let enriched = enrich(&records, &nyc_config(), &nyc_layers(), &null_progress()).unwrap();
        assert_eq!(enriched[0].region("precinct"), Some(&RegionId::Number(75)));
    }

    #[test]
    fn output_preserves_input_order_and_is_repeatable() {
        let records: Vec<CollisionRecord> = (0..200)
            .rev()
            .map(|id| {
                let lat = 40.50 + f64::from(i32::try_from(id).unwrap()) * 0.002;
                record(id, Some(lat), Some(-73.92))
            })
            .collect();

        let first = enrich(&records, &nyc_config(), &nyc_layers(), &null_progress()).unwrap();
        let second = enrich(&records, &nyc_config(), &nyc_layers(), &null_progress()).unwrap();

        let ids: Vec<i64> = first.iter().map(|c| c.id).collect();
        let expected: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, expected);
        assert_eq!(first, second);

        for collision in &first {
            for region in collision.regions.values() {
                assert!(region.is_none() || collision.valid_location);
            }
        }
    }

    #[test]
    fn load_layers_reads_geojson_relative_to_base_dir() {
        let dir = std::env::temp_dir().join(format!("collision_map_layers_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("precinct.geojson"),
            r#"{"type": "FeatureCollection", "features": [{
                "type": "Feature",
                "properties": {"precinct": "1"},
                "geometry": {"type": "Polygon", "coordinates":
                    [[[-74.05, 40.65], [-74.05, 40.75], [-73.95, 40.75], [-73.95, 40.65], [-74.05, 40.65]]]}
            }]}"#,
        )
        .unwrap();

        let mut config = nyc_config();
        config.layers.truncate(1);
        let layers = load_layers(&config, &dir).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].name, "precinct");
        assert_eq!(layers[0].index.len(), 1);
    }

    #[test]
    fn load_layers_reports_missing_file_as_configuration_error() {
        let err = load_layers(&nyc_config(), Path::new("/nonexistent"))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            EnrichError::Configuration { ref layer, source: SpatialError::Io(_) } if layer == "precinct"
        ));
    }
}
