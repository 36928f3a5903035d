//! Console report for the `summary` command.

use std::collections::BTreeSet;

use collision_map_analytics::{
    Aggregation, DistributionStats, FrequencyRow, WeekCrosstab, crosstab_min_max,
    distribution_stats, frequency_table,
};
use collision_map_collision_models::{EnrichedCollision, Season};

const UNASSIGNED: &str = "unassigned";

/// Prints season and region frequency tables, casualty distributions,
/// and the hourly collision-rate extremes.
pub fn print(collisions: &[EnrichedCollision]) {
    println!("{} collisions", collisions.len());
    if collisions.is_empty() {
        return;
    }

    print_table("season", &frequency_table(collisions.iter().map(|c| c.season)));

    let layers: BTreeSet<&str> = collisions
        .iter()
        .flat_map(|c| c.regions.keys().map(String::as_str))
        .collect();
    for layer in layers {
        let rows = frequency_table(collisions.iter().map(|c| {
            c.region(layer)
                .map_or_else(|| UNASSIGNED.to_string(), ToString::to_string)
        }));
        print_table(layer, &rows);
    }

    #[allow(clippy::cast_precision_loss)]
    let injured: Vec<f64> = collisions.iter().map(|c| c.total_injured as f64).collect();
    #[allow(clippy::cast_precision_loss)]
    let killed: Vec<f64> = collisions.iter().map(|c| c.total_killed as f64).collect();
    print_distribution("total injured", distribution_stats(&injured).as_ref());
    print_distribution("total killed", distribution_stats(&killed).as_ref());

    let weeks = weeks_spanned(collisions);
    let crosstab = WeekCrosstab::collisions(collisions).scaled(weeks);
    println!();
    println!("Collisions per hour slot, averaged over {weeks:.1} weeks");
    match crosstab.min_max() {
        Some((lo, hi)) => println!("  all seasons: min {lo:.3}, max {hi:.3}"),
        None => println!("  all seasons: no data"),
    }
    if let Some((day, hour, rate)) = peak_slot(&crosstab) {
        println!("  peak:        {day} {hour:02}:00 ({rate:.3})");
    }
    match crosstab_min_max(
        collisions,
        |c| c.season,
        Season::all(),
        |_| 1.0,
        Aggregation::Count,
        Some(weeks),
    ) {
        Some((lo, hi)) => println!("  per season:  min {lo:.3}, max {hi:.3}"),
        None => println!("  per season:  no data"),
    }
}

fn print_table(title: &str, rows: &[FrequencyRow]) {
    println!();
    println!("{:<24} {:>10} {:>8}", title.to_uppercase(), "COUNT", "%");
    println!("{}", "-".repeat(44));
    for row in rows {
        println!("{:<24} {:>10} {:>7.2}%", row.label, row.count, row.percent);
    }
}

fn print_distribution(title: &str, stats: Option<&DistributionStats>) {
    println!();
    println!("{:<28} {:>14}", title.to_uppercase(), "VALUE");
    println!("{}", "-".repeat(43));
    let Some(stats) = stats else {
        println!("no values");
        return;
    };
    for (label, value) in stats.rows() {
        match value {
            Some(value) => println!("{label:<28} {value:>14.3}"),
            None => println!("{label:<28} {:>14}", "n/a"),
        }
    }
}

/// Busiest weekday and hour; the earliest slot wins a tie.
fn peak_slot(crosstab: &WeekCrosstab) -> Option<(&'static str, usize, f64)> {
    crosstab
        .rows()
        .flat_map(|(day, hours)| {
            hours
                .iter()
                .enumerate()
                .filter_map(move |(hour, cell)| cell.map(|rate| (day, hour, rate)))
        })
        .fold(None, |best, slot| match best {
            Some((_, _, rate)) if rate >= slot.2 => best,
            _ => Some(slot),
        })
}

/// Number of weeks between the earliest and latest collision, never less
/// than one.
#[allow(clippy::cast_precision_loss)]
fn weeks_spanned(collisions: &[EnrichedCollision]) -> f64 {
    let first = collisions.iter().map(|c| c.occurred_at).min();
    let last = collisions.iter().map(|c| c.occurred_at).max();
    match (first, last) {
        (Some(first), Some(last)) => ((last - first).num_days() as f64 / 7.0).max(1.0),
        _ => 1.0,
    }
}
