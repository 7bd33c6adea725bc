#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative leveling session state.
//!
//! The session owns the normalization rules, the award scenarios, the
//! active scenario and the audit trail. Adapters mutate it exclusively via
//! [`apply`] and read it through the [`query`] module; the pure systems
//! receive plain slices and maps taken from those queries.

use bid_leveling_core::{
    AuditAction, AuditEntry, BidderId, Command, Event, NormalizationRule, RuleId, RuleKind,
    RuleScope, Scenario, ScenarioId, ScopeId, SessionError, MAX_RULE_MAGNITUDE,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_SCENARIO_ID: &str = "SCN-001";
const DEFAULT_SCENARIO_NAME: &str = "Base Award";

/// Rules every session starts with, all inactive.
#[must_use]
pub fn default_rules() -> Vec<NormalizationRule> {
    vec![
        NormalizationRule::new(
            "RULE-PLUG-GAPS",
            "Plug exclusions and clarifications",
            RuleKind::Plug,
            5_000.0,
            RuleScope::Gaps,
        )
        .with_active(false),
        NormalizationRule::new(
            "RULE-GC-MARKUP",
            "General conditions markup",
            RuleKind::Markup,
            3.0,
            RuleScope::All,
        )
        .with_active(false),
        NormalizationRule::new(
            "RULE-RISK-GAPS",
            "Risk contingency on gaps",
            RuleKind::Markup,
            5.0,
            RuleScope::Gaps,
        )
        .with_active(false),
    ]
}

/// Reports whether the rule belongs to the default set.
#[must_use]
pub fn is_default_rule(rule: &RuleId) -> bool {
    default_rules().iter().any(|candidate| &candidate.id == rule)
}

fn check_rule_value(rule: &RuleId, value: f64) -> Result<(), SessionError> {
    if !value.is_finite() {
        return Err(SessionError::NonFiniteValue(rule.clone()));
    }
    if value.abs() > MAX_RULE_MAGNITUDE {
        return Err(SessionError::ValueOutOfRange(rule.clone()));
    }
    Ok(())
}

/// Serializable form of the state a session persists between runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Rules in display order.
    pub rules: Vec<NormalizationRule>,
    /// Scenarios in creation order.
    pub scenarios: Vec<Scenario>,
    /// Scenario that was active when the snapshot was taken.
    pub active_scenario: ScenarioId,
}

/// Represents the authoritative leveling session.
#[derive(Clone, Debug)]
pub struct Session {
    rules: Vec<NormalizationRule>,
    scenarios: Vec<Scenario>,
    active: usize,
    audit: Vec<AuditEntry>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a session with the default rules and an empty base scenario.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
            scenarios: vec![Scenario::new(
                ScenarioId::new(DEFAULT_SCENARIO_ID),
                DEFAULT_SCENARIO_NAME,
            )],
            active: 0,
            audit: Vec::new(),
        }
    }

    /// Rebuilds a session from a snapshot.
    ///
    /// The audit trail starts empty. A snapshot without scenarios is filled
    /// with the base scenario. Duplicate rule or scenario ids and rule values
    /// the session would refuse are rejected.
    pub fn restore(snapshot: SessionSnapshot) -> Result<Self, SessionError> {
        let SessionSnapshot {
            rules,
            mut scenarios,
            active_scenario,
        } = snapshot;

        if scenarios.is_empty() {
            scenarios.push(Scenario::new(
                ScenarioId::new(DEFAULT_SCENARIO_ID),
                DEFAULT_SCENARIO_NAME,
            ));
        }

        for (index, scenario) in scenarios.iter().enumerate() {
            if scenarios[..index]
                .iter()
                .any(|earlier| earlier.id == scenario.id)
            {
                return Err(SessionError::DuplicateScenario(scenario.id.clone()));
            }
        }

        let active = scenarios
            .iter()
            .position(|scenario| scenario.id == active_scenario)
            .ok_or(SessionError::UnknownScenario(active_scenario))?;

        for (index, rule) in rules.iter().enumerate() {
            check_rule_value(&rule.id, rule.value)?;
            if rules[..index].iter().any(|earlier| earlier.id == rule.id) {
                return Err(SessionError::DuplicateRule(rule.id.clone()));
            }
        }

        Ok(Self {
            rules,
            scenarios,
            active,
            audit: Vec::new(),
        })
    }

    fn rule_mut(&mut self, rule: &RuleId) -> Option<&mut NormalizationRule> {
        self.rules.iter_mut().find(|candidate| &candidate.id == rule)
    }

    fn active_scenario_mut(&mut self) -> &mut Scenario {
        &mut self.scenarios[self.active]
    }

    fn next_scenario_id(&self) -> ScenarioId {
        let mut ordinal = self.scenarios.len() + 1;
        loop {
            let candidate = ScenarioId::new(format!("SCN-{ordinal:03}"));
            if self.scenarios.iter().all(|scenario| scenario.id != candidate) {
                return candidate;
            }
            ordinal += 1;
        }
    }

    fn record(&mut self, action: AuditAction, detail: String) {
        let sequence = self.audit.len() as u64 + 1;
        self.audit.push(AuditEntry {
            sequence,
            action,
            detail,
        });
    }

    fn reject_rule(&self, rule: RuleId, reason: SessionError, out_events: &mut Vec<Event>) {
        warn!(%rule, %reason, "rule command rejected");
        out_events.push(Event::RuleRejected { rule, reason });
    }

    fn reject_scenario(&self, reason: SessionError, out_events: &mut Vec<Event>) {
        warn!(%reason, "scenario command rejected");
        out_events.push(Event::ScenarioRejected { reason });
    }

    fn toggle_rule(&mut self, rule: RuleId, out_events: &mut Vec<Event>) {
        let Some(target) = self.rule_mut(&rule) else {
            self.reject_rule(rule.clone(), SessionError::UnknownRule(rule), out_events);
            return;
        };

        target.active = !target.active;
        let active = target.active;
        let state = if active { "active" } else { "inactive" };
        self.record(AuditAction::RuleToggled, format!("{rule} is now {state}"));
        out_events.push(Event::RuleToggled { rule, active });
    }

    fn set_rule_value(&mut self, rule: RuleId, value: f64, out_events: &mut Vec<Event>) {
        if let Err(reason) = check_rule_value(&rule, value) {
            self.reject_rule(rule, reason, out_events);
            return;
        }

        let Some(target) = self.rule_mut(&rule) else {
            self.reject_rule(rule.clone(), SessionError::UnknownRule(rule), out_events);
            return;
        };

        let previous = std::mem::replace(&mut target.value, value);
        self.record(
            AuditAction::RuleValueChanged,
            format!("{rule} changed from {previous} to {value}"),
        );
        out_events.push(Event::RuleValueChanged {
            rule,
            previous,
            value,
        });
    }

    fn add_rule(&mut self, rule: NormalizationRule, out_events: &mut Vec<Event>) {
        let id = rule.id.clone();
        if let Err(reason) = check_rule_value(&id, rule.value) {
            self.reject_rule(id, reason, out_events);
            return;
        }
        if self.rules.iter().any(|existing| existing.id == id) {
            self.reject_rule(id.clone(), SessionError::DuplicateRule(id), out_events);
            return;
        }

        self.record(AuditAction::RuleAdded, format!("{id} added as '{}'", rule.label));
        self.rules.push(rule);
        out_events.push(Event::RuleAdded { rule: id });
    }

    fn remove_rule(&mut self, rule: RuleId, out_events: &mut Vec<Event>) {
        if is_default_rule(&rule) {
            self.reject_rule(rule.clone(), SessionError::DefaultRule(rule), out_events);
            return;
        }

        let Some(index) = self.rules.iter().position(|candidate| candidate.id == rule) else {
            self.reject_rule(rule.clone(), SessionError::UnknownRule(rule), out_events);
            return;
        };

        let removed = self.rules.remove(index);
        self.record(
            AuditAction::RuleRemoved,
            format!("{rule} ('{}') removed", removed.label),
        );
        out_events.push(Event::RuleRemoved { rule });
    }

    fn create_scenario(&mut self, name: String, out_events: &mut Vec<Event>) {
        let name = name.trim();
        if name.is_empty() {
            self.reject_scenario(SessionError::BlankScenarioName, out_events);
            return;
        }

        let id = self.next_scenario_id();
        let source = self.scenarios[self.active].id.clone();
        let scenario = self.scenarios[self.active].fork(id.clone(), name);
        self.scenarios.push(scenario);
        self.active = self.scenarios.len() - 1;

        self.record(
            AuditAction::ScenarioCreated,
            format!("{id} '{name}' created from {source}"),
        );
        out_events.push(Event::ScenarioCreated {
            scenario: id.clone(),
            source,
        });
        out_events.push(Event::ActiveScenarioChanged { scenario: id });
    }

    fn set_active_scenario(&mut self, scenario: ScenarioId, out_events: &mut Vec<Event>) {
        let Some(index) = self
            .scenarios
            .iter()
            .position(|candidate| candidate.id == scenario)
        else {
            self.reject_scenario(SessionError::UnknownScenario(scenario), out_events);
            return;
        };

        if index == self.active {
            return;
        }

        self.active = index;
        self.record(AuditAction::ScenarioActivated, format!("{scenario} activated"));
        out_events.push(Event::ActiveScenarioChanged { scenario });
    }

    fn select_bidder(&mut self, scope: ScopeId, bidder: BidderId, out_events: &mut Vec<Event>) {
        let active = self.active_scenario_mut();
        let scenario = active.id.clone();
        let replaced = active.select(scope.clone(), bidder.clone());

        let detail = match &replaced {
            Some(previous) => format!("{scope} awarded to {bidder} in {scenario} (was {previous})"),
            None => format!("{scope} awarded to {bidder} in {scenario}"),
        };
        self.record(AuditAction::BidderSelected, detail);
        out_events.push(Event::BidderSelected {
            scenario,
            scope,
            bidder,
            replaced,
        });
    }

    fn clear_selection(&mut self, scope: ScopeId, out_events: &mut Vec<Event>) {
        let active = self.active_scenario_mut();
        let scenario = active.id.clone();
        let Some(bidder) = active.clear(&scope) else {
            self.reject_scenario(SessionError::NoSelection(scope), out_events);
            return;
        };

        self.record(
            AuditAction::SelectionCleared,
            format!("{scope} no longer awarded to {bidder} in {scenario}"),
        );
        out_events.push(Event::SelectionCleared {
            scenario,
            scope,
            bidder,
        });
    }
}

/// Applies the provided command to the session, mutating state deterministically.
pub fn apply(session: &mut Session, command: Command, out_events: &mut Vec<Event>) {
    debug!(?command, "applying session command");
    match command {
        Command::ToggleRule { rule } => session.toggle_rule(rule, out_events),
        Command::SetRuleValue { rule, value } => session.set_rule_value(rule, value, out_events),
        Command::AddRule { rule } => session.add_rule(rule, out_events),
        Command::RemoveRule { rule } => session.remove_rule(rule, out_events),
        Command::CreateScenario { name } => session.create_scenario(name, out_events),
        Command::SetActiveScenario { scenario } => {
            session.set_active_scenario(scenario, out_events)
        }
        Command::SelectBidder { scope, bidder } => session.select_bidder(scope, bidder, out_events),
        Command::ClearSelection { scope } => session.clear_selection(scope, out_events),
    }
}

/// Query functions that provide read-only access to the session state.
pub mod query {
    use std::collections::BTreeMap;

    use super::{Session, SessionSnapshot};
    use bid_leveling_core::{
        AuditEntry, BidderId, NormalizationRule, RuleId, Scenario, ScenarioId, ScopeId,
    };

    /// Rules in display order, active or not.
    #[must_use]
    pub fn rules(session: &Session) -> &[NormalizationRule] {
        &session.rules
    }

    /// Looks up a rule by identifier.
    #[must_use]
    pub fn rule<'a>(session: &'a Session, id: &RuleId) -> Option<&'a NormalizationRule> {
        session.rules.iter().find(|rule| &rule.id == id)
    }

    /// Scenarios in creation order.
    #[must_use]
    pub fn scenarios(session: &Session) -> &[Scenario] {
        &session.scenarios
    }

    /// Looks up a scenario by identifier.
    #[must_use]
    pub fn scenario<'a>(session: &'a Session, id: &ScenarioId) -> Option<&'a Scenario> {
        session.scenarios.iter().find(|scenario| &scenario.id == id)
    }

    /// Scenario currently receiving selections.
    #[must_use]
    pub fn active_scenario(session: &Session) -> &Scenario {
        &session.scenarios[session.active]
    }

    /// Selection map of the active scenario.
    #[must_use]
    pub fn active_selections(session: &Session) -> &BTreeMap<ScopeId, BidderId> {
        active_scenario(session).selections()
    }

    /// Every confirmed change in the order it was applied.
    #[must_use]
    pub fn audit_trail(session: &Session) -> &[AuditEntry] {
        &session.audit
    }

    /// Captures the persistent state of the session.
    #[must_use]
    pub fn snapshot(session: &Session) -> SessionSnapshot {
        SessionSnapshot {
            rules: session.rules.clone(),
            scenarios: session.scenarios.clone(),
            active_scenario: active_scenario(session).id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{apply, default_rules, is_default_rule, query, Session};
    use bid_leveling_core::{Command, RuleId, ScenarioId};

    #[test]
    fn default_rules_start_inactive() {
        let rules = default_rules();
        assert_eq!(rules.len(), 3);
        assert!(rules.iter().all(|rule| !rule.active));
        assert!(rules.iter().all(|rule| is_default_rule(&rule.id)));
        assert!(!is_default_rule(&RuleId::new("RULE-CUSTOM")));
    }

    #[test]
    fn new_session_activates_base_scenario() {
        let session = Session::new();
        let active = query::active_scenario(&session);
        assert_eq!(active.id, ScenarioId::new("SCN-001"));
        assert!(active.selections().is_empty());
        assert!(query::audit_trail(&session).is_empty());
    }

    #[test]
    fn scenario_ids_skip_taken_ordinals() {
        let mut session = Session::new();
        session.scenarios[0].id = ScenarioId::new("SCN-002");
        assert_eq!(session.next_scenario_id(), ScenarioId::new("SCN-003"));
    }

    #[test]
    fn audit_sequence_is_monotonic() {
        let mut session = Session::new();
        let mut events = Vec::new();
        for _ in 0..3 {
            apply(
                &mut session,
                Command::ToggleRule {
                    rule: RuleId::new("RULE-GC-MARKUP"),
                },
                &mut events,
            );
        }
        let sequences: Vec<u64> = query::audit_trail(&session)
            .iter()
            .map(|entry| entry.sequence)
            .collect();
        assert_eq!(sequences, [1, 2, 3]);
    }
}
