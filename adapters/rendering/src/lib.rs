#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared presentation contracts for bid leveling adapters.
//!
//! Adapters never recompute leveled values themselves. They build a
//! [`MatrixPresentation`] from the session's rules and selections, which
//! calls into the pure systems once per cell, and hand it to a
//! [`MatrixBackend`] for display.

use std::collections::BTreeMap;

use anyhow::Result as AnyResult;
use bid_leveling_core::{Bidder, BidderId, CoverageStatus, NormalizationRule, ScopeId, ScopeItem};
use bid_leveling_system_normalization::level;
use bid_leveling_system_row_stats::RowSummary;
use bid_leveling_system_scenario::{aggregate, ScenarioTotals};
use bid_leveling_system_synthesis::{derive_notes_count, derive_status};

/// RGB color used when presenting cells.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
}

impl Color {
    /// Creates a color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
        }
    }

    /// Returns a new color darkened towards black by the provided amount.
    #[must_use]
    pub fn darken(self, amount: f32) -> Self {
        let keep = 1.0 - amount.clamp(0.0, 1.0);
        Self {
            red: self.red * keep,
            green: self.green * keep,
            blue: self.blue * keep,
        }
    }

    /// Converts the color back into byte RGB values.
    #[must_use]
    pub fn to_rgb_u8(self) -> (u8, u8, u8) {
        (
            channel_to_u8(self.red),
            channel_to_u8(self.green),
            channel_to_u8(self.blue),
        )
    }
}

fn channel_to_u8(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Accent color associated with a coverage status.
#[must_use]
pub const fn status_color(status: CoverageStatus) -> Color {
    match status {
        CoverageStatus::Included => Color::from_rgb_u8(0x10, 0xb9, 0x81),
        CoverageStatus::Clarify => Color::from_rgb_u8(0xf5, 0x9e, 0x0b),
        CoverageStatus::Excluded => Color::from_rgb_u8(0xf4, 0x3f, 0x5e),
        CoverageStatus::Alternate => Color::from_rgb_u8(0x0e, 0xa5, 0xe9),
    }
}

/// Which cells the matrix shows values for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisplayFilter {
    /// Every cell is visible.
    #[default]
    All,
    /// Only fully included cells are visible.
    IncludedOnly,
    /// Only cells with a coverage gap are visible.
    GapsOnly,
}

impl DisplayFilter {
    /// Builds a filter from the toggles of the filter pane. "Included only" wins.
    #[must_use]
    pub const fn from_toggles(included_only: bool, gaps_only: bool) -> Self {
        if included_only {
            Self::IncludedOnly
        } else if gaps_only {
            Self::GapsOnly
        } else {
            Self::All
        }
    }

    /// Reports whether a cell with the provided status is visible.
    #[must_use]
    pub const fn is_visible(self, status: CoverageStatus) -> bool {
        match self {
            Self::All => true,
            Self::IncludedOnly => !status.is_gap(),
            Self::GapsOnly => status.is_gap(),
        }
    }
}

/// Options applied when building a matrix presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixOptions {
    /// Filter deciding which cells show values.
    pub filter: DisplayFilter,
    /// Whether cells carry a status background tint.
    pub heatmap: bool,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            filter: DisplayFilter::All,
            heatmap: true,
        }
    }
}

/// Everything an adapter needs to draw one cell.
#[derive(Clone, Debug, PartialEq)]
pub struct CellPresentation {
    /// Bidder owning the column.
    pub bidder: BidderId,
    /// Derived coverage status.
    pub status: CoverageStatus,
    /// Unadjusted synthetic price.
    pub raw: i64,
    /// Leveled price under the current rules.
    pub leveled: i64,
    /// Number of clarification notes attached to the cell.
    pub notes: u8,
    /// Deviation from the row median, `NaN` when the median is zero.
    pub delta: f64,
    /// Whether the cell is visible under the display filter.
    pub visible: bool,
    /// Whether the cell deviates far enough from the median to be flagged.
    pub outlier: bool,
    /// Whether the active scenario awards this scope item to this bidder.
    pub selected: bool,
    /// Background tint when the heatmap is enabled.
    pub background: Option<Color>,
}

/// One scope item and its cells in bidder order.
#[derive(Clone, Debug, PartialEq)]
pub struct RowPresentation {
    /// Scope item owning the row.
    pub scope: ScopeItem,
    /// Median leveled value across every bidder in the row.
    pub median: i64,
    /// Cells in column order.
    pub cells: Vec<CellPresentation>,
}

/// Fully derived leveling matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixPresentation {
    /// Column headers.
    pub bidders: Vec<Bidder>,
    /// Rows in scope order.
    pub rows: Vec<RowPresentation>,
    /// Totals of the active scenario over the rows.
    pub totals: ScenarioTotals,
}

impl MatrixPresentation {
    /// Levels every cell of the package under `rules` and the active `selections`.
    #[must_use]
    pub fn build(
        bidders: &[Bidder],
        scope_items: &[ScopeItem],
        rules: &[NormalizationRule],
        selections: &BTreeMap<ScopeId, BidderId>,
        options: MatrixOptions,
    ) -> Self {
        let rows = scope_items
            .iter()
            .map(|item| build_row(bidders, item, rules, selections, options))
            .collect();
        let scope_ids: Vec<ScopeId> = scope_items.iter().map(|item| item.id.clone()).collect();

        Self {
            bidders: bidders.to_vec(),
            rows,
            totals: aggregate(&scope_ids, selections, rules),
        }
    }

    /// Number of visible outlier cells across the matrix.
    #[must_use]
    pub fn outlier_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.cells.iter())
            .filter(|cell| cell.outlier)
            .count()
    }
}

fn build_row(
    bidders: &[Bidder],
    item: &ScopeItem,
    rules: &[NormalizationRule],
    selections: &BTreeMap<ScopeId, BidderId>,
    options: MatrixOptions,
) -> RowPresentation {
    let statuses: Vec<CoverageStatus> = bidders
        .iter()
        .map(|bidder| derive_status(&bidder.id, &item.id))
        .collect();
    let breakdowns: Vec<_> = bidders
        .iter()
        .zip(&statuses)
        .map(|(bidder, status)| level(&bidder.id, &item.id, *status, rules))
        .collect();
    let leveled: Vec<i64> = breakdowns.iter().map(|value| value.leveled).collect();
    let summary = RowSummary::from_values(&leveled);
    let awarded = selections.get(&item.id);

    let cells = bidders
        .iter()
        .zip(statuses)
        .zip(breakdowns)
        .enumerate()
        .map(|(column, ((bidder, status), breakdown))| {
            let visible = options.filter.is_visible(status);
            CellPresentation {
                bidder: bidder.id.clone(),
                status,
                raw: breakdown.raw,
                leveled: breakdown.leveled,
                notes: derive_notes_count(&bidder.id, &item.id),
                delta: summary.delta(column).unwrap_or(f64::NAN),
                visible,
                outlier: summary.is_outlier(column, visible),
                selected: awarded == Some(&bidder.id),
                background: options
                    .heatmap
                    .then(|| status_color(status).darken(0.8)),
            }
        })
        .collect();

    RowPresentation {
        scope: item.clone(),
        median: summary.median(),
        cells,
    }
}

/// Formats a whole-dollar amount with thousands separators, e.g. `$54,506`.
#[must_use]
pub fn format_money(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if amount < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

/// Formats a fractional delta as a signed percentage, or an em dash when undefined.
#[must_use]
pub fn format_delta(delta: f64) -> String {
    if delta.is_nan() {
        return "\u{2014}".to_owned();
    }
    format!("{:+.1}%", delta * 100.0)
}

/// Backend capable of presenting leveling matrices.
pub trait MatrixBackend {
    /// Presents the matrix, typically by drawing or printing it.
    fn present(&mut self, presentation: &MatrixPresentation) -> AnyResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn included_only_wins_over_gaps_only() {
        assert_eq!(
            DisplayFilter::from_toggles(true, true),
            DisplayFilter::IncludedOnly
        );
        assert_eq!(
            DisplayFilter::from_toggles(false, true),
            DisplayFilter::GapsOnly
        );
        assert_eq!(DisplayFilter::from_toggles(false, false), DisplayFilter::All);
    }

    #[test]
    fn filters_partition_statuses() {
        for status in CoverageStatus::ALL {
            assert!(DisplayFilter::All.is_visible(status));
            assert_ne!(
                DisplayFilter::IncludedOnly.is_visible(status),
                DisplayFilter::GapsOnly.is_visible(status)
            );
        }
    }

    #[test]
    fn money_uses_thousands_separators() {
        assert_eq!(format_money(0), "$0");
        assert_eq!(format_money(999), "$999");
        assert_eq!(format_money(54_506), "$54,506");
        assert_eq!(format_money(1_234_567), "$1,234,567");
        assert_eq!(format_money(-45_494), "-$45,494");
    }

    #[test]
    fn delta_formats_sign_and_undefined() {
        assert_eq!(format_delta(0.25), "+25.0%");
        assert_eq!(format_delta(-0.125), "-12.5%");
        assert_eq!(format_delta(f64::NAN), "\u{2014}");
    }

    #[test]
    fn color_round_trips_bytes() {
        let color = Color::from_rgb_u8(0x10, 0xb9, 0x81);
        assert_eq!(color.to_rgb_u8(), (0x10, 0xb9, 0x81));
        assert_eq!(color.darken(1.0).to_rgb_u8(), (0, 0, 0));
    }
}
