#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure aggregation of scenario selections into award totals.

use std::collections::BTreeMap;

use bid_leveling_core::{round_half_up, BidderId, NormalizationRule, ScopeId};
use bid_leveling_system_normalization::apply_rules;
use bid_leveling_system_synthesis::derive_status;

/// Roll-up of a scenario over a package's scope items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScenarioTotals {
    /// Sum of the leveled values of every selected cell.
    pub total: i64,
    /// Percentage of scope items with a selection, rounded to a whole number.
    pub completeness: u8,
}

/// Leveled contribution of one selected scope item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AwardLine {
    /// Scope item that was awarded.
    pub scope: ScopeId,
    /// Bidder that received the award.
    pub bidder: BidderId,
    /// Leveled value of the awarded cell.
    pub leveled: i64,
}

/// Aggregates the selections over `scope_ids` under the provided rules.
///
/// Scope items without a selection contribute nothing to the total.
/// Selections for scope items outside `scope_ids` are ignored. An empty
/// `scope_ids` slice yields zero completeness. Duplicate entries in
/// `scope_ids` count once per occurrence. The total saturates at the `i64`
/// bounds instead of overflowing.
#[must_use]
pub fn aggregate(
    scope_ids: &[ScopeId],
    selections: &BTreeMap<ScopeId, BidderId>,
    rules: &[NormalizationRule],
) -> ScenarioTotals {
    let lines = award_lines(scope_ids, selections, rules);
    let total = lines
        .iter()
        .fold(0_i64, |total, line| total.saturating_add(line.leveled));
    ScenarioTotals {
        total,
        completeness: completeness(lines.len(), scope_ids.len()),
    }
}

/// Levels every selected scope item in `scope_ids` order.
#[must_use]
pub fn award_lines(
    scope_ids: &[ScopeId],
    selections: &BTreeMap<ScopeId, BidderId>,
    rules: &[NormalizationRule],
) -> Vec<AwardLine> {
    scope_ids
        .iter()
        .filter_map(|scope| {
            let bidder = selections.get(scope)?;
            let status = derive_status(bidder, scope);
            Some(AwardLine {
                scope: scope.clone(),
                bidder: bidder.clone(),
                leveled: apply_rules(bidder, scope, status, rules),
            })
        })
        .collect()
}

fn completeness(selected: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = round_half_up(100.0 * selected as f64 / total as f64);
    percent.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::completeness;

    #[test]
    fn completeness_rounds_to_whole_percent() {
        assert_eq!(completeness(1, 3), 33);
        assert_eq!(completeness(2, 3), 67);
        assert_eq!(completeness(1, 8), 13);
    }

    #[test]
    fn completeness_of_empty_package_is_zero() {
        assert_eq!(completeness(0, 0), 0);
    }
}
