#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the bid leveling engine.
//!
//! This crate defines the vocabulary that connects adapters, the
//! authoritative leveling session, and the pure systems. Adapters submit
//! [`Command`] values describing desired mutations, the session executes
//! those commands via its `apply` entry point, and then broadcasts [`Event`]
//! values describing what changed. Systems never observe the session
//! directly; they receive plain identifiers, statuses and rule slices.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seed used when generating the default demo package.
pub const DEFAULT_DEMO_SEED: u64 = 20_260_206;

/// Largest absolute value a normalization rule may carry.
///
/// Keeps leveled values and scenario totals well inside the `i64` range.
pub const MAX_RULE_MAGNITUDE: f64 = 1_000_000_000.0;

/// Rounds to the nearest integer, resolving ties toward positive infinity.
///
/// All leveled values, medians and percentages share this rounding so that
/// ties such as `-2.5` resolve to `-2` rather than away from zero.
#[must_use]
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from the provided text.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the textual representation of the identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a vendor submitting prices against a package.
    BidderId
);
string_id!(
    /// Identifier of a single line item of bid scope.
    ScopeId
);
string_id!(
    /// Identifier of a normalization rule.
    RuleId
);
string_id!(
    /// Identifier of an award scenario.
    ScenarioId
);

/// Vendor bidding on a package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bidder {
    /// Stable identifier used for all derivations.
    pub id: BidderId,
    /// Human readable name shown in column headers.
    pub label: String,
}

impl Bidder {
    /// Creates a bidder descriptor.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: BidderId::new(id),
            label: label.into(),
        }
    }
}

/// Line item of work that bidders price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeItem {
    /// Stable identifier used for all derivations.
    pub id: ScopeId,
    /// Human readable description shown in row headers.
    pub label: String,
    /// Optional grouping tag such as a specification division.
    pub group: Option<String>,
}

impl ScopeItem {
    /// Creates an ungrouped scope item.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: ScopeId::new(id),
            label: label.into(),
            group: None,
        }
    }

    /// Attaches a grouping tag to the scope item.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// How a bidder addressed a given scope item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoverageStatus {
    /// The scope is fully carried in the bid.
    Included,
    /// The scope is explicitly carved out of the bid.
    Excluded,
    /// The bidder's intent is unclear and needs a clarification.
    Clarify,
    /// The scope is priced as an alternate.
    Alternate,
}

impl CoverageStatus {
    /// Every status in display order.
    pub const ALL: [CoverageStatus; 4] = [
        CoverageStatus::Included,
        CoverageStatus::Clarify,
        CoverageStatus::Excluded,
        CoverageStatus::Alternate,
    ];

    /// Reports whether the status represents a coverage gap.
    #[must_use]
    pub const fn is_gap(self) -> bool {
        !matches!(self, Self::Included)
    }

    /// Short tag used in dense grid cells.
    #[must_use]
    pub const fn short_tag(self) -> &'static str {
        match self {
            Self::Included => "INC",
            Self::Excluded => "EXCL",
            Self::Clarify => "CLAR",
            Self::Alternate => "ALTE",
        }
    }
}

impl fmt::Display for CoverageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Included => "Included",
            Self::Excluded => "Excluded",
            Self::Clarify => "Clarify",
            Self::Alternate => "Alternate",
        };
        f.write_str(label)
    }
}

/// Arithmetic applied by a normalization rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Percentage markup applied after plugs.
    Markup,
    /// Flat amount added to the leveled value.
    Plug,
}

/// Cells a normalization rule applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    /// Every cell regardless of coverage.
    All,
    /// Only cells whose status is not [`CoverageStatus::Included`].
    Gaps,
}

impl RuleScope {
    /// Reports whether a cell with the provided status falls under the scope.
    #[must_use]
    pub const fn matches(self, status: CoverageStatus) -> bool {
        match self {
            Self::All => true,
            Self::Gaps => status.is_gap(),
        }
    }
}

/// Configured leveling adjustment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizationRule {
    /// Stable identifier of the rule.
    pub id: RuleId,
    /// Label shown in the rule panel.
    pub label: String,
    /// Arithmetic the rule performs.
    pub kind: RuleKind,
    /// Percentage for markups, flat amount for plugs. Negative values are honored.
    pub value: f64,
    /// Inactive rules never affect leveled values.
    pub active: bool,
    /// Cells the rule applies to.
    pub apply_to: RuleScope,
}

impl NormalizationRule {
    /// Creates an active rule.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        kind: RuleKind,
        value: f64,
        apply_to: RuleScope,
    ) -> Self {
        Self {
            id: RuleId::new(id),
            label: label.into(),
            kind,
            value,
            active: true,
            apply_to,
        }
    }

    /// Overrides the active flag.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Reports whether the rule contributes to a cell with the provided status.
    #[must_use]
    pub fn applies_to(&self, status: CoverageStatus) -> bool {
        self.active && self.apply_to.matches(status)
    }
}

/// Hypothetical award configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Stable identifier of the scenario.
    pub id: ScenarioId,
    /// Display name chosen by the estimator.
    pub name: String,
    selections: BTreeMap<ScopeId, BidderId>,
}

impl Scenario {
    /// Creates a scenario with no selections.
    #[must_use]
    pub fn new(id: ScenarioId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            selections: BTreeMap::new(),
        }
    }

    /// Creates a new scenario holding an independent copy of this scenario's selections.
    #[must_use]
    pub fn fork(&self, id: ScenarioId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            selections: self.selections.clone(),
        }
    }

    /// Selects a bidder for a scope item, returning the previously selected bidder.
    pub fn select(&mut self, scope: ScopeId, bidder: BidderId) -> Option<BidderId> {
        self.selections.insert(scope, bidder)
    }

    /// Removes the selection for a scope item, returning the bidder that was selected.
    pub fn clear(&mut self, scope: &ScopeId) -> Option<BidderId> {
        self.selections.remove(scope)
    }

    /// Bidder selected for the scope item, if any.
    #[must_use]
    pub fn selection(&self, scope: &ScopeId) -> Option<&BidderId> {
        self.selections.get(scope)
    }

    /// Complete selection map ordered by scope identifier.
    #[must_use]
    pub fn selections(&self) -> &BTreeMap<ScopeId, BidderId> {
        &self.selections
    }
}

/// Commands that express all permissible session mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Flips the active flag of a rule.
    ToggleRule {
        /// Rule to toggle.
        rule: RuleId,
    },
    /// Replaces the numeric value of a rule.
    SetRuleValue {
        /// Rule to update.
        rule: RuleId,
        /// New percentage or flat amount.
        value: f64,
    },
    /// Appends a user-defined rule to the end of the rule list.
    AddRule {
        /// Rule to append.
        rule: NormalizationRule,
    },
    /// Removes a user-defined rule.
    RemoveRule {
        /// Rule to remove.
        rule: RuleId,
    },
    /// Creates a scenario by copying the active scenario's selections.
    CreateScenario {
        /// Display name for the new scenario.
        name: String,
    },
    /// Switches the active scenario.
    SetActiveScenario {
        /// Scenario to activate.
        scenario: ScenarioId,
    },
    /// Selects a bidder for a scope item within the active scenario.
    SelectBidder {
        /// Scope item being awarded.
        scope: ScopeId,
        /// Bidder receiving the award.
        bidder: BidderId,
    },
    /// Clears the active scenario's selection for a scope item.
    ClearSelection {
        /// Scope item to clear.
        scope: ScopeId,
    },
}

/// Events broadcast by the session after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that a rule's active flag changed.
    RuleToggled {
        /// Rule that changed.
        rule: RuleId,
        /// Active flag after the toggle.
        active: bool,
    },
    /// Confirms that a rule's value changed.
    RuleValueChanged {
        /// Rule that changed.
        rule: RuleId,
        /// Value before the change.
        previous: f64,
        /// Value after the change.
        value: f64,
    },
    /// Confirms that a user rule was appended.
    RuleAdded {
        /// Identifier of the appended rule.
        rule: RuleId,
    },
    /// Confirms that a user rule was removed.
    RuleRemoved {
        /// Identifier of the removed rule.
        rule: RuleId,
    },
    /// Reports that a rule command was rejected.
    RuleRejected {
        /// Rule named in the command.
        rule: RuleId,
        /// Specific reason the command failed.
        reason: SessionError,
    },
    /// Confirms that a scenario was created and activated.
    ScenarioCreated {
        /// Identifier allocated to the new scenario.
        scenario: ScenarioId,
        /// Scenario whose selections were copied.
        source: ScenarioId,
    },
    /// Announces that a different scenario became active.
    ActiveScenarioChanged {
        /// Scenario that is now active.
        scenario: ScenarioId,
    },
    /// Reports that a scenario command was rejected.
    ScenarioRejected {
        /// Specific reason the command failed.
        reason: SessionError,
    },
    /// Confirms that a bidder was selected for a scope item.
    BidderSelected {
        /// Scenario that recorded the selection.
        scenario: ScenarioId,
        /// Scope item that was awarded.
        scope: ScopeId,
        /// Bidder that received the award.
        bidder: BidderId,
        /// Bidder that held the award before, if any.
        replaced: Option<BidderId>,
    },
    /// Confirms that a scope item's selection was cleared.
    SelectionCleared {
        /// Scenario that dropped the selection.
        scenario: ScenarioId,
        /// Scope item that no longer has an award.
        scope: ScopeId,
        /// Bidder that held the award.
        bidder: BidderId,
    },
}

/// Reasons a session command may be rejected.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum SessionError {
    /// No rule with the provided identifier exists.
    #[error("no rule with id '{0}'")]
    UnknownRule(RuleId),
    /// A rule with the provided identifier already exists.
    #[error("a rule with id '{0}' already exists")]
    DuplicateRule(RuleId),
    /// Rules from the default set cannot be removed.
    #[error("rule '{0}' belongs to the default set and cannot be removed")]
    DefaultRule(RuleId),
    /// Rule values must be finite numbers.
    #[error("rule '{0}' received a non-finite value")]
    NonFiniteValue(RuleId),
    /// Rule values must not exceed [`MAX_RULE_MAGNITUDE`] in absolute value.
    #[error("rule '{0}' received a value beyond the supported magnitude")]
    ValueOutOfRange(RuleId),
    /// No scenario with the provided identifier exists.
    #[error("no scenario with id '{0}'")]
    UnknownScenario(ScenarioId),
    /// A scenario with the provided identifier already exists.
    #[error("a scenario with id '{0}' already exists")]
    DuplicateScenario(ScenarioId),
    /// Scenario names must contain visible characters.
    #[error("scenario name must not be blank")]
    BlankScenarioName,
    /// The scope item has no selection to clear.
    #[error("scope '{0}' has no selection in the active scenario")]
    NoSelection(ScopeId),
}

/// Kind of change recorded in the audit trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// A rule's active flag changed.
    RuleToggled,
    /// A rule's value changed.
    RuleValueChanged,
    /// A user rule was appended.
    RuleAdded,
    /// A user rule was removed.
    RuleRemoved,
    /// A scenario was created.
    ScenarioCreated,
    /// The active scenario changed.
    ScenarioActivated,
    /// A bidder was selected for a scope item.
    BidderSelected,
    /// A scope item's selection was cleared.
    SelectionCleared,
}

/// Single entry of the session's audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic sequence number starting at one.
    pub sequence: u64,
    /// Kind of change.
    pub action: AuditAction,
    /// Human readable detail of the change.
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::{
        round_half_up, BidderId, CoverageStatus, NormalizationRule, RuleKind, RuleScope, Scenario,
        ScenarioId, ScopeId, SessionError,
    };
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn round_half_up_resolves_ties_upward() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(14.4), 14.0);
        assert_eq!(round_half_up(-14.6), -15.0);
    }

    #[test]
    fn gaps_scope_excludes_only_included_cells() {
        assert!(!RuleScope::Gaps.matches(CoverageStatus::Included));
        assert!(RuleScope::Gaps.matches(CoverageStatus::Excluded));
        assert!(RuleScope::Gaps.matches(CoverageStatus::Clarify));
        assert!(RuleScope::Gaps.matches(CoverageStatus::Alternate));
        for status in CoverageStatus::ALL {
            assert!(RuleScope::All.matches(status));
        }
    }

    #[test]
    fn inactive_rule_never_applies() {
        let rule = NormalizationRule::new("r", "Plug", RuleKind::Plug, 10.0, RuleScope::All)
            .with_active(false);
        for status in CoverageStatus::ALL {
            assert!(!rule.applies_to(status));
        }
    }

    #[test]
    fn fork_copies_selections_without_sharing() {
        let mut base = Scenario::new(ScenarioId::new("SCN-001"), "Base");
        let _ = base.select(ScopeId::new("A"), BidderId::new("VND-1"));

        let mut fork = base.fork(ScenarioId::new("SCN-002"), "Alt");
        let replaced = fork.select(ScopeId::new("A"), BidderId::new("VND-2"));
        let _ = fork.select(ScopeId::new("B"), BidderId::new("VND-3"));

        assert_eq!(replaced, Some(BidderId::new("VND-1")));
        assert_eq!(base.selections().len(), 1);
        assert_eq!(
            base.selection(&ScopeId::new("A")),
            Some(&BidderId::new("VND-1"))
        );
    }

    #[test]
    fn scenario_round_trips_through_bincode() {
        let mut scenario = Scenario::new(ScenarioId::new("SCN-007"), "Value engineered");
        let _ = scenario.select(ScopeId::new("CSI-23-0900"), BidderId::new("VND-012"));
        assert_round_trip(&scenario);
    }

    #[test]
    fn session_error_round_trips_through_bincode() {
        assert_round_trip(&SessionError::NoSelection(ScopeId::new("CSI-23-3400")));
    }

    #[test]
    fn rule_kinds_serialize_in_lowercase() {
        let json = serde_json::to_string(&RuleKind::Markup).expect("serialize");
        assert_eq!(json, "\"markup\"");
        let scope: RuleScope = serde_json::from_str("\"gaps\"").expect("deserialize");
        assert_eq!(scope, RuleScope::Gaps);
    }
}
