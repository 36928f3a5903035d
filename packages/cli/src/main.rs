#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the collision map toolchain.
//!
//! Uses `indicatif-log-bridge` (via [`collision_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod summary;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use collision_map_cli_utils::{IndicatifProgress, MultiProgress};
use collision_map_collision_models::{EnrichedCollision, Season};
use collision_map_enrich::registry;
use collision_map_enrich_models::EnrichConfig;

#[derive(Parser)]
#[command(name = "collision_map", about = "Collision data enrichment toolchain")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich a collisions CSV export with seasons, flags, and region attribution
    Enrich {
        /// Collisions CSV export to read
        #[arg(long)]
        input: PathBuf,
        /// Where to write the enriched collisions (JSON array)
        #[arg(long)]
        output: PathBuf,
        /// Enrichment config TOML (defaults to the embedded NYC config)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Comma-separated list of region layers to attribute (overrides
        /// `COLLISION_MAP_LAYERS` env var)
        #[arg(long)]
        layers: Option<String>,
        /// Directory that relative layer paths are resolved against
        #[arg(long, default_value = ".")]
        base_dir: PathBuf,
    },
    /// List the configured region layers
    Layers {
        /// Enrichment config TOML (defaults to the embedded NYC config)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the season of a date
    Season {
        /// Date as YYYY-MM-DD
        date: String,
    },
    /// Print frequency tables and hourly cross-tab extremes for an enriched dataset
    Summary {
        /// Enriched collisions JSON written by `enrich`
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = collision_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Enrich {
            input,
            output,
            config,
            layers,
            base_dir,
        } => {
            let config = registry::enabled_layers(resolve_config(config.as_deref())?, layers);
            run_enrich(&multi, &config, &input, &output, &base_dir)?;
        }
        Commands::Layers { config } => {
            let config = resolve_config(config.as_deref())?;
            println!("{:<20} {:<10} PATH", "NAME", "ID");
            println!("{}", "-".repeat(70));
            for layer in &config.layers {
                println!(
                    "{:<20} {:<10} {}",
                    layer.name,
                    layer.id_kind,
                    layer.path.display()
                );
            }
        }
        Commands::Season { date } => {
            let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
                .map_err(|e| format!("Invalid date {date:?}: {e}"))?;
            println!("{}", Season::of(date));
        }
        Commands::Summary { input } => {
            let collisions: Vec<EnrichedCollision> =
                serde_json::from_reader(std::io::BufReader::new(File::open(&input)?))?;
            summary::print(&collisions);
        }
    }

    Ok(())
}

fn resolve_config(path: Option<&Path>) -> Result<EnrichConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => registry::load_config(path)?,
        None => registry::default_config(),
    })
}

/// Loads layers, reads the export, enriches it, and writes the result.
///
/// Nothing is written unless every record enriches successfully.
fn run_enrich(
    multi: &MultiProgress,
    config: &EnrichConfig,
    input: &Path,
    output: &Path,
    base_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    let layers = collision_map_enrich::load_layers(config, base_dir)?;
    let records = collision_map_ingest::read_collisions_from_path(input)?;

    let progress = IndicatifProgress::steps_bar(multi, "Enriching collisions");
    let enriched = match collision_map_enrich::enrich(&records, config, &layers, &progress) {
        Ok(enriched) => enriched,
        Err(e) => {
            progress.finish_and_clear();
            return Err(e.into());
        }
    };

    write_json_atomically(output, &enriched)?;

    log::info!(
        "Wrote {} enriched collisions to {} in {:.1}s",
        enriched.len(),
        output.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Serializes `value` to a temporary sibling of `path`, then renames it
/// into place so a failed write never leaves a truncated file at `path`.
fn write_json_atomically<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let written =
        write_json(&tmp, value).and_then(|()| std::fs::rename(&tmp, path).map_err(Into::into));

    if written.is_err() {
        std::fs::remove_file(&tmp).ok();
    }
    written
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("collision_map_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn writes_json_and_leaves_no_temporary_file() {
        let dir = scratch_dir("write_ok");
        let output = dir.join("enriched.json");

        write_json_atomically(&output, &vec![1, 2, 3]).unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "[1,2,3]");
        assert!(!dir.join("enriched.json.tmp").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_serialization_keeps_previous_output() {
        let dir = scratch_dir("write_err");
        let output = dir.join("enriched.json");
        std::fs::write(&output, "previous").unwrap();

        // Non-string map keys cannot be written as JSON.
        let mut unserializable = std::collections::BTreeMap::new();
        unserializable.insert(vec![1], 1);
        assert!(write_json_atomically(&output, &unserializable).is_err());

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "previous");
        assert!(!dir.join("enriched.json.tmp").exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
