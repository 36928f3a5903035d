//! Distribution profile of a numeric column.

use serde::{Deserialize, Serialize};

/// Summary statistics of a numeric column, ignoring `NaN` values.
///
/// Quantiles use linear interpolation between the two nearest ranks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionStats {
    /// Number of non-`NaN` values.
    pub count: usize,
    /// Number of `NaN` values that were omitted.
    pub nulls: usize,
    /// Number of distinct non-`NaN` values.
    pub unique: usize,
    pub min: f64,
    pub p1: f64,
    pub p5: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
    pub mean: f64,
    /// Median of absolute deviations from the median (unscaled).
    pub median_absolute_deviation: f64,
    /// Sample standard deviation. `None` with fewer than two values.
    pub standard_deviation: Option<f64>,
    /// Adjusted Fisher-Pearson skewness. `None` with fewer than three values.
    pub skew: Option<f64>,
}

impl DistributionStats {
    /// Labelled rows in report order.
    #[must_use]
    pub fn rows(&self) -> Vec<(&'static str, Option<f64>)> {
        #[allow(clippy::cast_precision_loss)]
        let counts = [
            ("count", Some(self.count as f64)),
            ("nulls", Some(self.nulls as f64)),
            ("unique", Some(self.unique as f64)),
        ];
        counts
            .into_iter()
            .chain([
                ("min", Some(self.min)),
                ("1%", Some(self.p1)),
                ("5%", Some(self.p5)),
                ("25%", Some(self.p25)),
                ("50%", Some(self.median)),
                ("75%", Some(self.p75)),
                ("95%", Some(self.p95)),
                ("99%", Some(self.p99)),
                ("max", Some(self.max)),
                ("mean", Some(self.mean)),
                ("median absolute deviation", Some(self.median_absolute_deviation)),
                ("standard deviation", self.standard_deviation),
                ("skew", self.skew),
            ])
            .collect()
    }
}

/// Profiles `values`, or returns `None` if every value is `NaN`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
pub fn distribution_stats(values: &[f64]) -> Option<DistributionStats> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    let n = count as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let median = quantile(&sorted, 0.5);

    let mut deviations: Vec<f64> = sorted.iter().map(|v| (v - median).abs()).collect();
    deviations.sort_by(f64::total_cmp);

    let central_moment =
        |power: i32| sorted.iter().map(|v| (v - mean).powi(power)).sum::<f64>() / n;
    let m2 = central_moment(2);

    let standard_deviation = (count >= 2).then(|| (m2 * n / (n - 1.0)).sqrt());
    let skew = (count >= 3).then(|| {
        if m2 == 0.0 {
            0.0
        } else {
            (n * (n - 1.0)).sqrt() / (n - 2.0) * central_moment(3) / m2.powf(1.5)
        }
    });

    let mut unique = sorted.clone();
    unique.dedup();

    Some(DistributionStats {
        count,
        nulls: values.len() - count,
        unique: unique.len(),
        min: sorted[0],
        p1: quantile(&sorted, 0.01),
        p5: quantile(&sorted, 0.05),
        p25: quantile(&sorted, 0.25),
        median,
        p75: quantile(&sorted, 0.75),
        p95: quantile(&sorted, 0.95),
        p99: quantile(&sorted, 0.99),
        max: sorted[count - 1],
        mean,
        median_absolute_deviation: quantile(&deviations, 0.5),
        standard_deviation,
        skew,
    })
}

/// Linearly interpolated quantile of a sorted, non-empty slice.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - position.floor();
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
