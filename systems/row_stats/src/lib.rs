#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Row statistics used to flag outlier bids against the row median.

use bid_leveling_core::round_half_up;

/// Absolute fractional deviation from the row median at which a cell is an outlier.
pub const OUTLIER_THRESHOLD: f64 = 0.25;

/// Median of the provided values.
///
/// Even-length inputs average the two middle values and round the result.
/// An empty input yields zero.
#[must_use]
pub fn median(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        let sum = sorted[mid - 1] as f64 + sorted[mid] as f64;
        round_half_up(sum / 2.0) as i64
    }
}

/// Fractional difference between `value` and `baseline`.
///
/// A zero baseline yields `NaN`, which callers must treat as "no delta".
#[must_use]
pub fn percent_delta(value: i64, baseline: i64) -> f64 {
    if baseline == 0 {
        return f64::NAN;
    }
    (value - baseline) as f64 / baseline as f64
}

/// Reports whether a cell deviates far enough from its row median to be flagged.
///
/// Hidden cells and undefined deltas are never outliers.
#[must_use]
pub fn is_outlier(delta: f64, visible: bool) -> bool {
    visible && !delta.is_nan() && delta.abs() >= OUTLIER_THRESHOLD
}

/// Median and per-cell deviations of a single matrix row.
#[derive(Clone, Debug, PartialEq)]
pub struct RowSummary {
    median: i64,
    deltas: Vec<f64>,
}

impl RowSummary {
    /// Summarizes a row of leveled values in column order.
    #[must_use]
    pub fn from_values(values: &[i64]) -> Self {
        let median = median(values);
        let deltas = values
            .iter()
            .map(|value| percent_delta(*value, median))
            .collect();
        Self { median, deltas }
    }

    /// Median of the row.
    #[must_use]
    pub const fn median(&self) -> i64 {
        self.median
    }

    /// Deviation of the cell at `column` from the row median.
    #[must_use]
    pub fn delta(&self, column: usize) -> Option<f64> {
        self.deltas.get(column).copied()
    }

    /// Whether the cell at `column` is an outlier given its visibility.
    #[must_use]
    pub fn is_outlier(&self, column: usize, visible: bool) -> bool {
        self.delta(column)
            .is_some_and(|delta| is_outlier(delta, visible))
    }
}
