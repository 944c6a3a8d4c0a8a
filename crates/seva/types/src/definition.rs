//! Workflow definitions: the blueprint for an approval pipeline.
//!
//! A definition is a directed graph of officer/citizen/system states joined
//! by role-guarded transitions. The graph may contain cycles (the query loop
//! revisits earlier states), so validation checks reachability, not
//! acyclicity. Definitions are immutable once validated; to change one,
//! publish a new version.

use crate::error::{EngineError, EngineResult};
use crate::ids::{RoleId, ServiceKey, StateId, TransitionId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Workflow Definition ──────────────────────────────────────────────

/// An immutable, versioned workflow definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// The service this workflow processes applications for.
    pub service_key: ServiceKey,
    /// Definition version. Applications pin `(service_key, version)` at
    /// submission.
    pub version: u32,
    /// Human-readable name.
    pub name: String,
    /// The states of the pipeline.
    pub states: Vec<StateDef>,
    /// The transitions between states.
    pub transitions: Vec<TransitionDef>,
    /// Policy governing the query/resubmission loop.
    pub query_policy: QueryPolicy,
}

impl WorkflowDefinition {
    pub fn new(service_key: ServiceKey, version: u32, name: impl Into<String>) -> Self {
        Self {
            service_key,
            version,
            name: name.into(),
            states: Vec::new(),
            transitions: Vec::new(),
            query_policy: QueryPolicy::default(),
        }
    }

    pub fn with_query_policy(mut self, policy: QueryPolicy) -> Self {
        self.query_policy = policy;
        self
    }

    /// Add a state to the graph.
    pub fn add_state(&mut self, state: StateDef) -> EngineResult<()> {
        if self.states.iter().any(|s| s.id == state.id) {
            return Err(EngineError::Validation(format!(
                "duplicate state id '{}'",
                state.id
            )));
        }
        self.states.push(state);
        Ok(())
    }

    /// Add a transition to the graph.
    pub fn add_transition(&mut self, transition: TransitionDef) -> EngineResult<()> {
        if self.transitions.iter().any(|t| t.id == transition.id) {
            return Err(EngineError::Validation(format!(
                "duplicate transition id '{}'",
                transition.id
            )));
        }
        if !self.states.iter().any(|s| s.id == transition.from) {
            return Err(EngineError::Validation(format!(
                "transition '{}' references unknown from-state '{}'",
                transition.id, transition.from
            )));
        }
        if !self.states.iter().any(|s| s.id == transition.to) {
            return Err(EngineError::Validation(format!(
                "transition '{}' references unknown to-state '{}'",
                transition.id, transition.to
            )));
        }
        self.transitions.push(transition);
        Ok(())
    }

    /// The entry state of the pipeline.
    pub fn initial_state(&self) -> Option<&StateDef> {
        self.states.iter().find(|s| s.initial)
    }

    pub fn get_state(&self, id: &StateId) -> Option<&StateDef> {
        self.states.iter().find(|s| &s.id == id)
    }

    pub fn get_transition(&self, id: &TransitionId) -> Option<&TransitionDef> {
        self.transitions.iter().find(|t| &t.id == id)
    }

    /// Transitions leaving a state.
    pub fn outgoing(&self, state: &StateId) -> Vec<&TransitionDef> {
        self.transitions.iter().filter(|t| &t.from == state).collect()
    }

    /// Validate structural correctness.
    ///
    /// Guard expression compilation happens at registry load, where the
    /// expression language is available; this checks everything else.
    pub fn validate(&self) -> EngineResult<()> {
        if self.states.is_empty() {
            return Err(EngineError::Validation(
                "workflow must have at least one state".into(),
            ));
        }

        let initial_count = self.states.iter().filter(|s| s.initial).count();
        if initial_count != 1 {
            return Err(EngineError::Validation(format!(
                "workflow must have exactly one initial state, found {}",
                initial_count
            )));
        }

        if !self.states.iter().any(|s| s.terminal) {
            return Err(EngineError::Validation(
                "workflow must have at least one terminal state".into(),
            ));
        }

        let mut seen = HashSet::new();
        for state in &self.states {
            if !seen.insert(&state.id) {
                return Err(EngineError::Validation(format!(
                    "duplicate state id '{}'",
                    state.id
                )));
            }
            if state.terminal && state.disposal.is_none() {
                return Err(EngineError::Validation(format!(
                    "terminal state '{}' must carry a disposal",
                    state.id
                )));
            }
            if state.terminal && !self.outgoing(&state.id).is_empty() {
                return Err(EngineError::Validation(format!(
                    "terminal state '{}' must not have outgoing transitions",
                    state.id
                )));
            }
            if state.actor == ActorKind::Officer && state.allowed_roles.is_empty() && !state.terminal
            {
                return Err(EngineError::Validation(format!(
                    "officer state '{}' must list allowed roles",
                    state.id
                )));
            }
        }

        let mut seen_transitions = HashSet::new();
        for t in &self.transitions {
            if !seen_transitions.insert(&t.id) {
                return Err(EngineError::Validation(format!(
                    "duplicate transition id '{}'",
                    t.id
                )));
            }
            if self.get_state(&t.from).is_none() {
                return Err(EngineError::Validation(format!(
                    "transition '{}' references unknown from-state '{}'",
                    t.id, t.from
                )));
            }
            if self.get_state(&t.to).is_none() {
                return Err(EngineError::Validation(format!(
                    "transition '{}' references unknown to-state '{}'",
                    t.id, t.to
                )));
            }
            if t.trigger == TriggerKind::Officer && t.allowed_roles.is_empty() {
                return Err(EngineError::Validation(format!(
                    "officer transition '{}' must list allowed roles",
                    t.id
                )));
            }
        }

        // The query state is entered by the query controller via direct
        // assignment, so it needs no incoming edge, but it must exist and
        // be a citizen state.
        match self.get_state(&self.query_policy.query_state) {
            Some(query_state) => {
                if query_state.actor != ActorKind::Citizen || query_state.terminal {
                    return Err(EngineError::Validation(format!(
                        "query state '{}' must be a non-terminal citizen state",
                        query_state.id
                    )));
                }
            }
            None => {
                return Err(EngineError::Validation(format!(
                    "query policy references unknown state '{}'",
                    self.query_policy.query_state
                )))
            }
        }

        // Every other state must be reachable from the initial state. The
        // graph may be cyclic; BFS handles revisits.
        if let Some(initial) = self.initial_state() {
            let reachable = self.reachable_from(&initial.id);
            for state in &self.states {
                if state.id == self.query_policy.query_state {
                    continue;
                }
                if !reachable.contains(&state.id) {
                    return Err(EngineError::Validation(format!(
                        "state '{}' is unreachable from the initial state",
                        state.id
                    )));
                }
            }
        }

        Ok(())
    }

    fn reachable_from(&self, start: &StateId) -> HashSet<StateId> {
        let mut visited = HashSet::new();
        let mut queue = vec![start.clone()];

        while let Some(current) = queue.pop() {
            if visited.insert(current.clone()) {
                for t in self.outgoing(&current) {
                    if !visited.contains(&t.to) {
                        queue.push(t.to.clone());
                    }
                }
            }
        }

        visited
    }
}

// ── States ───────────────────────────────────────────────────────────

/// A state in the approval pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateDef {
    pub id: StateId,
    pub name: String,
    /// Who acts while the application sits in this state.
    pub actor: ActorKind,
    /// Roles permitted to hold the task for this state.
    #[serde(default)]
    pub allowed_roles: Vec<RoleId>,
    /// Entry state of the pipeline (exactly one per definition).
    #[serde(default)]
    pub initial: bool,
    /// Terminal states end processing and fix the disposal.
    #[serde(default)]
    pub terminal: bool,
    /// Disposal recorded when the application enters this terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposal: Option<crate::application::DisposalType>,
    /// Stage SLA budget in working days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_days: Option<u32>,
}

impl StateDef {
    pub fn officer(id: impl Into<String>, name: impl Into<String>, roles: Vec<RoleId>) -> Self {
        Self {
            id: StateId::new(id),
            name: name.into(),
            actor: ActorKind::Officer,
            allowed_roles: roles,
            initial: false,
            terminal: false,
            disposal: None,
            sla_days: None,
        }
    }

    pub fn citizen(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: StateId::new(id),
            name: name.into(),
            actor: ActorKind::Citizen,
            allowed_roles: Vec::new(),
            initial: false,
            terminal: false,
            disposal: None,
            sla_days: None,
        }
    }

    pub fn terminal(
        id: impl Into<String>,
        name: impl Into<String>,
        disposal: crate::application::DisposalType,
    ) -> Self {
        Self {
            id: StateId::new(id),
            name: name.into(),
            actor: ActorKind::System,
            allowed_roles: Vec::new(),
            initial: false,
            terminal: true,
            disposal: Some(disposal),
            sla_days: None,
        }
    }

    pub fn as_initial(mut self) -> Self {
        self.initial = true;
        self
    }

    pub fn with_sla_days(mut self, days: u32) -> Self {
        self.sla_days = Some(days);
        self
    }
}

/// Who acts in a given state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Officer,
    Citizen,
    System,
}

// ── Transitions ──────────────────────────────────────────────────────

/// A transition edge between two states.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionDef {
    pub id: TransitionId,
    pub from: StateId,
    pub to: StateId,
    /// What kind of actor fires this transition. System transitions bypass
    /// the role check.
    pub trigger: TriggerKind,
    /// Roles permitted to fire this transition.
    #[serde(default)]
    pub allowed_roles: Vec<RoleId>,
    /// Guard expression source, compiled when the definition is loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    /// Decision outcome recorded when this transition fires. Forwarding
    /// transitions carry none; the final approve/reject carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<crate::decision::DecisionOutcome>,
    /// Side-effect actions dispatched after the transition commits.
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

impl TransitionDef {
    pub fn new(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        trigger: TriggerKind,
    ) -> Self {
        Self {
            id: TransitionId::new(id),
            from: StateId::new(from),
            to: StateId::new(to),
            trigger,
            allowed_roles: Vec::new(),
            guard: None,
            decision: None,
            actions: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: Vec<RoleId>) -> Self {
        self.allowed_roles = roles;
        self
    }

    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    pub fn with_decision(mut self, decision: crate::decision::DecisionOutcome) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn with_action(mut self, action: ActionSpec) -> Self {
        self.actions.push(action);
        self
    }
}

/// What kind of actor fires a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Officer,
    Citizen,
    System,
}

// ── Actions ──────────────────────────────────────────────────────────

/// Side-effect actions a transition may carry.
///
/// A closed enumeration: a definition naming an unknown kind fails to
/// deserialize at load, never at dispatch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpec {
    /// Notify the role pool that a task awaits claiming.
    AssignTask { role: RoleId },
    /// Send a notification through the notification collaborator.
    Notify {
        event_type: String,
        template: String,
        #[serde(default)]
        recipients: Vec<String>,
    },
    /// Generate a certificate or rejection memo for a disposed application.
    GenerateCertificate { template_id: String },
    /// Call an external integration with an opaque payload.
    CallIntegration {
        integration: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

// ── Query Policy ─────────────────────────────────────────────────────

/// Policy governing the query/resubmission loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryPolicy {
    /// Maximum number of query cycles per application.
    pub max_cycles: u32,
    /// Whether raising a query pauses the stage SLA clock.
    pub pause_sla: bool,
    /// Citizen response window in working days.
    pub response_due_days: u32,
    /// The citizen-actor state applications sit in while a query is
    /// pending.
    pub query_state: StateId,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            max_cycles: 3,
            pause_sla: true,
            response_due_days: 7,
            query_state: StateId::new("CITIZEN_QUERY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::DisposalType;

    fn clerk_roles() -> Vec<RoleId> {
        vec![RoleId::new("CLERK")]
    }

    fn make_two_stage() -> WorkflowDefinition {
        let mut def = WorkflowDefinition::new(ServiceKey::new("water_connection"), 1, "Water");
        def.add_state(
            StateDef::officer("CLERK_REVIEW", "Clerk Review", clerk_roles())
                .as_initial()
                .with_sla_days(3),
        )
        .unwrap();
        def.add_state(StateDef::citizen("CITIZEN_QUERY", "Citizen Query"))
            .unwrap();
        def.add_state(StateDef::terminal("CLOSED", "Closed", DisposalType::Approved))
            .unwrap();
        def.add_transition(
            TransitionDef::new("approve", "CLERK_REVIEW", "CLOSED", TriggerKind::Officer)
                .with_roles(clerk_roles()),
        )
        .unwrap();
        def
    }

    #[test]
    fn valid_definition_passes() {
        assert!(make_two_stage().validate().is_ok());
    }

    #[test]
    fn duplicate_state_rejected() {
        let mut def = make_two_stage();
        let result = def.add_state(StateDef::officer("CLERK_REVIEW", "Again", clerk_roles()));
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn transition_to_unknown_state_rejected() {
        let mut def = make_two_stage();
        let result = def.add_transition(TransitionDef::new(
            "bad",
            "CLERK_REVIEW",
            "NOWHERE",
            TriggerKind::Officer,
        ));
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[test]
    fn missing_initial_state_rejected() {
        let mut def = WorkflowDefinition::new(ServiceKey::new("s"), 1, "No Initial");
        def.add_state(StateDef::officer("A", "A", clerk_roles())).unwrap();
        def.add_state(StateDef::terminal("Z", "Z", DisposalType::Rejected))
            .unwrap();
        def.add_transition(TransitionDef::new("t", "A", "Z", TriggerKind::System))
            .unwrap();
        assert!(matches!(def.validate(), Err(EngineError::Validation(_))));
    }

    #[test]
    fn terminal_without_disposal_rejected() {
        let mut def = WorkflowDefinition::new(ServiceKey::new("s"), 1, "Bad Terminal");
        def.add_state(StateDef::officer("A", "A", clerk_roles()).as_initial())
            .unwrap();
        let mut terminal = StateDef::terminal("Z", "Z", DisposalType::Approved);
        terminal.disposal = None;
        def.add_state(terminal).unwrap();
        def.add_transition(
            TransitionDef::new("t", "A", "Z", TriggerKind::Officer).with_roles(clerk_roles()),
        )
        .unwrap();
        assert!(matches!(def.validate(), Err(EngineError::Validation(_))));
    }

    #[test]
    fn unreachable_state_rejected() {
        let mut def = make_two_stage();
        def.add_state(StateDef::officer("ISLAND", "Island", clerk_roles()))
            .unwrap();
        assert!(matches!(def.validate(), Err(EngineError::Validation(_))));
    }

    #[test]
    fn terminal_with_outgoing_rejected() {
        let mut def = make_two_stage();
        def.add_transition(
            TransitionDef::new("reopen", "CLOSED", "CLERK_REVIEW", TriggerKind::Officer)
                .with_roles(clerk_roles()),
        )
        .unwrap();
        assert!(matches!(def.validate(), Err(EngineError::Validation(_))));
    }

    #[test]
    fn cyclic_graph_is_valid() {
        // The query loop re-enters earlier states; cycles must validate.
        let mut def = make_two_stage();
        def.add_transition(TransitionDef::new(
            "raise_query",
            "CLERK_REVIEW",
            "CITIZEN_QUERY",
            TriggerKind::Officer,
        ).with_roles(clerk_roles()))
        .unwrap();
        def.add_transition(TransitionDef::new(
            "resubmit",
            "CITIZEN_QUERY",
            "CLERK_REVIEW",
            TriggerKind::Citizen,
        ))
        .unwrap();
        assert!(def.validate().is_ok());
    }

    #[test]
    fn unknown_action_kind_fails_deserialization() {
        let json = r#"{"kind": "launch_rocket"}"#;
        let result: Result<ActionSpec, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn action_spec_round_trips() {
        let action = ActionSpec::Notify {
            event_type: "application_forwarded".into(),
            template: "sms_forwarded".into(),
            recipients: vec!["applicant".into()],
        };
        let json = serde_json::to_string(&action).unwrap();
        let back: ActionSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(action, back);
    }
}
