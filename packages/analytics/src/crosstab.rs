//! Day-of-week by hour-of-day cross-tabulation.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use collision_map_collision_models::EnrichedCollision;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

const DAYS: usize = 7;
const HOURS: usize = 24;

/// Full day names, Monday first, matching [`Weekday::num_days_from_monday`].
const DAY_NAMES: [&str; DAYS] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// How observations falling in the same cell are combined.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Aggregation {
    /// Number of observations; values are ignored.
    Count,
    /// Sum of observed values.
    Sum,
    /// Mean of observed values.
    Mean,
}

/// A 7 x 24 grid of aggregated observations.
///
/// A cell is empty when it has nothing to report: for [`Aggregation::Count`]
/// that means its weekday or its hour was never observed at all, for the
/// other aggregations that the cell itself had no observations.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekCrosstab {
    cells: [[Option<f64>; HOURS]; DAYS],
}

impl WeekCrosstab {
    /// Aggregates `(timestamp, value)` observations by weekday and hour.
    #[must_use]
    pub fn build<I>(observations: I, aggregation: Aggregation) -> Self
    where
        I: IntoIterator<Item = (NaiveDateTime, f64)>,
    {
        let mut sums = [[0.0; HOURS]; DAYS];
        let mut counts = [[0.0_f64; HOURS]; DAYS];
        let mut days_seen = [false; DAYS];
        let mut hours_seen = [false; HOURS];

        for (at, value) in observations {
            let day = at.weekday().num_days_from_monday() as usize;
            let hour = at.hour() as usize;
            sums[day][hour] += value;
            counts[day][hour] += 1.0;
            days_seen[day] = true;
            hours_seen[hour] = true;
        }

        let mut cells = [[None; HOURS]; DAYS];
        for day in 0..DAYS {
            for hour in 0..HOURS {
                let count = counts[day][hour];
                cells[day][hour] = match aggregation {
                    Aggregation::Count => (days_seen[day] && hours_seen[hour]).then_some(count),
                    Aggregation::Sum => (count > 0.0).then_some(sums[day][hour]),
                    Aggregation::Mean => (count > 0.0).then(|| sums[day][hour] / count),
                };
            }
        }

        Self { cells }
    }

    /// Counts collisions per weekday and hour.
    #[must_use]
    pub fn collisions(collisions: &[EnrichedCollision]) -> Self {
        Self::build(
            collisions.iter().map(|c| (c.occurred_at, 1.0)),
            Aggregation::Count,
        )
    }

    /// Value of one cell.
    #[must_use]
    pub fn get(&self, weekday: Weekday, hour: u32) -> Option<f64> {
        self.cells
            .get(weekday.num_days_from_monday() as usize)?
            .get(hour as usize)
            .copied()
            .flatten()
    }

    /// Returns a copy with every cell divided by `divisor` (e.g. the number
    /// of weeks covered, to get a per-hour rate).
    #[must_use]
    pub fn scaled(&self, divisor: f64) -> Self {
        let mut cells = self.cells;
        for cell in cells.iter_mut().flatten() {
            *cell = cell.map(|v| v / divisor);
        }
        Self { cells }
    }

    /// Smallest and largest non-empty cell, or `None` if all are empty.
    #[must_use]
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.cells
            .iter()
            .flatten()
            .filter_map(|cell| *cell)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
            })
    }

    /// Rows in Monday-first order, labelled with the full day name.
    pub fn rows(&self) -> impl Iterator<Item = (&'static str, &[Option<f64>; HOURS])> {
        DAY_NAMES.iter().copied().zip(self.cells.iter())
    }
}

/// Extremes across one cross-tab per category, for a shared colour scale.
///
/// Each category in `categories` gets its own [`WeekCrosstab`] over the
/// collisions whose `category_of` equals it, aggregating `value_of`.
/// Categories without collisions are skipped. With a `divisor`, the
/// extremes are divided by it.
#[must_use]
pub fn crosstab_min_max<C, K, V>(
    collisions: &[EnrichedCollision],
    category_of: K,
    categories: &[C],
    value_of: V,
    aggregation: Aggregation,
    divisor: Option<f64>,
) -> Option<(f64, f64)>
where
    C: PartialEq,
    K: Fn(&EnrichedCollision) -> C,
    V: Fn(&EnrichedCollision) -> f64,
{
    let extremes = categories
        .iter()
        .filter_map(|category| {
            let observations = collisions
                .iter()
                .filter(|c| category_of(c) == *category)
                .map(|c| (c.occurred_at, value_of(c)));
            WeekCrosstab::build(observations, aggregation).min_max()
        })
        .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))?;

    Some(divisor.map_or(extremes, |d| (extremes.0 / d, extremes.1 / d)))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use collision_map_collision_models::{CasualtyCounts, Season};

    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn collision(id: i64, when: &str, injured: u32) -> EnrichedCollision {
        let occurred_at = at(when);
        EnrichedCollision {
            id,
            occurred_at,
            latitude: None,
            longitude: None,
            injured: CasualtyCounts {
                pedestrians: None,
                cyclists: None,
                motorists: Some(injured),
            },
            killed: CasualtyCounts::default(),
            total_injured: u64::from(injured),
            total_killed: 0,
            season: Season::of(occurred_at.date()),
            valid_location: false,
            serious: injured > 0,
            non_motorist: false,
            cyclist: false,
            pedestrian: false,
            regions: BTreeMap::new(),
        }
    }

    #[test]
    fn counts_by_weekday_and_hour() {
        // 2024-07-01 is a Monday.
        let collisions = vec![
            collision(1, "2024-07-01 08:15", 0),
            collision(2, "2024-07-01 08:45", 1),
            collision(3, "2024-07-08 08:05", 0),
            collision(4, "2024-07-03 17:30", 2),
        ];
        let ct = WeekCrosstab::collisions(&collisions);

        assert_eq!(ct.get(Weekday::Mon, 8), Some(3.0));
        assert_eq!(ct.get(Weekday::Wed, 17), Some(1.0));
        assert_eq!(ct.get(Weekday::Mon, 17), Some(0.0));
        assert_eq!(ct.get(Weekday::Tue, 8), None, "unobserved weekday");
        assert_eq!(ct.get(Weekday::Mon, 3), None, "unobserved hour");
        assert_eq!(ct.min_max(), Some((0.0, 3.0)));
    }

    #[test]
    fn sum_and_mean_leave_unobserved_cells_empty() {
        let observations = vec![
            (at("2024-07-01 08:15"), 1.0),
            (at("2024-07-01 08:45"), 3.0),
            (at("2024-07-03 17:30"), 2.0),
        ];
        let sum = WeekCrosstab::build(observations.clone(), Aggregation::Sum);
        assert_eq!(sum.get(Weekday::Mon, 8), Some(4.0));
        assert_eq!(sum.get(Weekday::Mon, 17), None);

        let mean = WeekCrosstab::build(observations, Aggregation::Mean);
        assert_eq!(mean.get(Weekday::Mon, 8), Some(2.0));
        assert_eq!(mean.min_max(), Some((2.0, 2.0)));
    }

    #[test]
    fn scaled_divides_every_cell() {
        let ct = WeekCrosstab::build(
            vec![(at("2024-07-06 23:59"), 1.0), (at("2024-07-13 23:00"), 1.0)],
            Aggregation::Count,
        )
        .scaled(4.0);
        assert_eq!(ct.get(Weekday::Sat, 23), Some(0.5));
    }

    #[test]
    fn empty_crosstab_has_no_extremes() {
        let ct = WeekCrosstab::build(Vec::new(), Aggregation::Count);
        assert_eq!(ct.min_max(), None);
    }

    #[test]
    fn rows_are_monday_first() {
        let ct = WeekCrosstab::build(Vec::new(), Aggregation::Count);
        let labels: Vec<&str> = ct.rows().map(|(label, _)| label).collect();
        assert_eq!(labels.first(), Some(&"Monday"));
        assert_eq!(labels.last(), Some(&"Sunday"));
        assert_eq!(labels[3], "Thursday");
    }

    #[test]
    fn shared_scale_spans_all_categories() {
        let collisions = vec![
            collision(1, "2024-07-01 08:15", 0),
            collision(2, "2024-07-01 08:45", 0),
            collision(3, "2024-07-01 08:50", 0),
            collision(4, "2024-01-03 17:30", 0),
        ];

        let extremes = crosstab_min_max(
            &collisions,
            |c| c.season,
            Season::all(),
            |_| 1.0,
            Aggregation::Count,
            None,
        );
        assert_eq!(extremes, Some((1.0, 3.0)));

        let per_week = crosstab_min_max(
            &collisions,
            |c| c.season,
            Season::all(),
            |_| 1.0,
            Aggregation::Count,
            Some(2.0),
        );
        assert_eq!(per_week, Some((0.5, 1.5)));
    }

    #[test]
    fn shared_scale_can_aggregate_values() {
        let collisions = vec![
            collision(1, "2024-07-01 08:15", 4),
            collision(2, "2024-07-01 08:45", 2),
            collision(3, "2024-01-03 17:30", 1),
        ];
        let extremes = crosstab_min_max(
            &collisions,
            |c| c.serious,
            &[true],
            |c| f64::from(c.injured.motorists.unwrap_or(0)),
            Aggregation::Sum,
            None,
        );
        assert_eq!(extremes, Some((1.0, 6.0)));
    }

    #[test]
    fn shared_scale_without_data_is_none() {
        let extremes = crosstab_min_max(
            &[],
            |c| c.season,
            Season::all(),
            |_| 1.0,
            Aggregation::Count,
            None,
        );
        assert_eq!(extremes, None);
    }
}
