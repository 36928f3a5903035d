#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reads the NYC Open Data "Motor Vehicle Collisions - Crashes" CSV export
//! into [`CollisionRecord`]s.
//!
//! Only the columns the enrichment pipeline needs are read; any other
//! columns are ignored. Unparseable coordinates and casualty counts are
//! treated as missing rather than failing the whole file.

use std::io::Read;
use std::path::Path;

use collision_map_collision_models::{CasualtyCounts, CollisionRecord};
use serde::Deserialize;

/// Errors that can occur while reading a collision export.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// CSV parsing or deserialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error opening the export.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One row of the crashes export, by source column name.
#[derive(Debug, Deserialize)]
struct CrashRow {
    #[serde(rename = "COLLISION_ID")]
    collision_id: i64,
    #[serde(rename = "CRASH DATE")]
    date: String,
    #[serde(rename = "CRASH TIME")]
    time: String,
    #[serde(rename = "LATITUDE", default, deserialize_with = "csv::invalid_option")]
    latitude: Option<f64>,
    #[serde(rename = "LONGITUDE", default, deserialize_with = "csv::invalid_option")]
    longitude: Option<f64>,
    #[serde(
        rename = "NUMBER OF PEDESTRIANS INJURED",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    pedestrians_injured: Option<u32>,
    #[serde(
        rename = "NUMBER OF CYCLIST INJURED",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    cyclists_injured: Option<u32>,
    #[serde(
        rename = "NUMBER OF MOTORIST INJURED",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    motorists_injured: Option<u32>,
    #[serde(
        rename = "NUMBER OF PEDESTRIANS KILLED",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    pedestrians_killed: Option<u32>,
    #[serde(
        rename = "NUMBER OF CYCLIST KILLED",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    cyclists_killed: Option<u32>,
    #[serde(
        rename = "NUMBER OF MOTORIST KILLED",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    motorists_killed: Option<u32>,
}

impl From<CrashRow> for CollisionRecord {
    fn from(row: CrashRow) -> Self {
        Self {
            id: row.collision_id,
            date: row.date,
            time: row.time,
            latitude: row.latitude,
            longitude: row.longitude,
            injured: CasualtyCounts {
                pedestrians: row.pedestrians_injured,
                cyclists: row.cyclists_injured,
                motorists: row.motorists_injured,
            },
            killed: CasualtyCounts {
                pedestrians: row.pedestrians_killed,
                cyclists: row.cyclists_killed,
                motorists: row.motorists_killed,
            },
        }
    }
}

/// Reads every collision from a CSV stream.
///
/// # Errors
///
/// Returns [`IngestError::Csv`] if the header is missing a required column
/// or a row has an unparseable identifier.
pub fn read_collisions<R: Read>(reader: R) -> Result<Vec<CollisionRecord>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let records = reader
        .deserialize::<CrashRow>()
        .map(|row| row.map(CollisionRecord::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Reads every collision from a CSV file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened or parsed.
pub fn read_collisions_from_path(path: &Path) -> Result<Vec<CollisionRecord>, IngestError> {
    let file = std::fs::File::open(path)?;
    let records = read_collisions(std::io::BufReader::new(file))?;
    log::info!("Read {} collisions from {}", records.len(), path.display());
    Ok(records)
}
