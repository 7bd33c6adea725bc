#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure normalization system that levels synthetic bids under a rule set.
//!
//! Leveling runs in a fixed order: the raw value is perturbed by a
//! per-cell tweak and a status multiplier and rounded, matching plugs are
//! added, and finally the summed markup percentage is applied and the
//! result rounded again. Reordering these steps changes the numbers.

use bid_leveling_core::{
    round_half_up, BidderId, CoverageStatus, NormalizationRule, RuleKind, ScopeId,
};
use bid_leveling_system_synthesis::{derive_normalization_tweak, derive_raw_value};

/// Multiplier applied to the raw value for cells with the provided status.
#[must_use]
pub const fn status_multiplier(status: CoverageStatus) -> f64 {
    match status {
        CoverageStatus::Included => 1.00,
        CoverageStatus::Clarify => 1.06,
        CoverageStatus::Excluded => 1.12,
        CoverageStatus::Alternate => 1.03,
    }
}

/// Sum of the rule contributions that match a single cell.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RuleAdjustments {
    /// Flat amount added by every active, matching plug.
    pub plug_total: f64,
    /// Percentage summed across every active, matching markup.
    pub markup_percent: f64,
}

impl RuleAdjustments {
    /// Collects the contributions of `rules` for a cell with the provided status.
    #[must_use]
    pub fn collect(status: CoverageStatus, rules: &[NormalizationRule]) -> Self {
        rules
            .iter()
            .filter(|rule| rule.applies_to(status))
            .fold(Self::default(), |mut adjustments, rule| {
                match rule.kind {
                    RuleKind::Plug => adjustments.plug_total += rule.value,
                    RuleKind::Markup => adjustments.markup_percent += rule.value,
                }
                adjustments
            })
    }

    /// Applies the adjustments to an intermediate value.
    ///
    /// Results beyond the `i64` range saturate at its bounds.
    #[must_use]
    pub fn apply(self, intermediate: i64) -> i64 {
        let plugged = intermediate as f64 + self.plug_total;
        round_half_up(plugged * (1.0 + self.markup_percent / 100.0)) as i64
    }
}

/// Full breakdown of how a cell's leveled value was produced.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeveledValue {
    /// Unadjusted synthetic price.
    pub raw: i64,
    /// Value after the tweak and status multiplier, before any rule.
    pub intermediate: i64,
    /// Rule contributions that matched the cell.
    pub adjustments: RuleAdjustments,
    /// Final leveled value.
    pub leveled: i64,
}

/// Rounded value after the tweak and status multiplier, before any rule applies.
#[must_use]
pub fn intermediate_value(bidder: &BidderId, scope: &ScopeId, status: CoverageStatus) -> i64 {
    let raw = derive_raw_value(bidder, scope) as f64;
    let tweak = derive_normalization_tweak(bidder, scope);
    round_half_up(raw * (1.0 + tweak) * status_multiplier(status)) as i64
}

/// Levels a cell and reports every intermediate quantity.
#[must_use]
pub fn level(
    bidder: &BidderId,
    scope: &ScopeId,
    status: CoverageStatus,
    rules: &[NormalizationRule],
) -> LeveledValue {
    let intermediate = intermediate_value(bidder, scope, status);
    let adjustments = RuleAdjustments::collect(status, rules);
    LeveledValue {
        raw: derive_raw_value(bidder, scope),
        intermediate,
        adjustments,
        leveled: adjustments.apply(intermediate),
    }
}

/// Levels a cell under the provided rules.
///
/// Inactive rules and rules whose scope does not match `status` are
/// ignored. Negative rule values are applied as-is; the result is not
/// clamped at zero.
#[must_use]
pub fn apply_rules(
    bidder: &BidderId,
    scope: &ScopeId,
    status: CoverageStatus,
    rules: &[NormalizationRule],
) -> i64 {
    RuleAdjustments::collect(status, rules).apply(intermediate_value(bidder, scope, status))
}

#[cfg(test)]
mod tests {
    use super::{status_multiplier, RuleAdjustments};
    use bid_leveling_core::{CoverageStatus, NormalizationRule, RuleKind, RuleScope};

    #[test]
    fn multipliers_match_status_table() {
        assert_eq!(status_multiplier(CoverageStatus::Included), 1.00);
        assert_eq!(status_multiplier(CoverageStatus::Clarify), 1.06);
        assert_eq!(status_multiplier(CoverageStatus::Excluded), 1.12);
        assert_eq!(status_multiplier(CoverageStatus::Alternate), 1.03);
    }

    #[test]
    fn collect_sums_each_kind_independently() {
        let rules = vec![
            NormalizationRule::new("p1", "Plug", RuleKind::Plug, 1_000.0, RuleScope::All),
            NormalizationRule::new("p2", "Plug", RuleKind::Plug, 250.0, RuleScope::Gaps),
            NormalizationRule::new("m1", "Markup", RuleKind::Markup, 3.0, RuleScope::All),
            NormalizationRule::new("m2", "Markup", RuleKind::Markup, 5.0, RuleScope::Gaps),
            NormalizationRule::new("m3", "Markup", RuleKind::Markup, 50.0, RuleScope::All)
                .with_active(false),
        ];

        let included = RuleAdjustments::collect(CoverageStatus::Included, &rules);
        assert_eq!(included.plug_total, 1_000.0);
        assert_eq!(included.markup_percent, 3.0);

        let gap = RuleAdjustments::collect(CoverageStatus::Clarify, &rules);
        assert_eq!(gap.plug_total, 1_250.0);
        assert_eq!(gap.markup_percent, 8.0);
    }

    #[test]
    fn apply_adds_plugs_before_markup() {
        let adjustments = RuleAdjustments {
            plug_total: 100.0,
            markup_percent: 10.0,
        };
        assert_eq!(adjustments.apply(1_000), 1_210);
    }

    #[test]
    fn apply_rounds_ties_upward() {
        let adjustments = RuleAdjustments {
            plug_total: 0.5,
            markup_percent: 0.0,
        };
        assert_eq!(adjustments.apply(10), 11);
        assert_eq!(adjustments.apply(-11), -10);
    }
}
