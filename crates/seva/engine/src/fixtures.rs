//! Seed definitions shared by tests, examples, and the demo service.

use crate::executor::Actor;
use seva_types::{
    ActionSpec, DecisionOutcome, QueryPolicy, RoleId, ServiceKey, StateDef, StateId,
    TransitionDef, TriggerKind, WorkflowDefinition,
};

/// The standard three-officer approval chain:
/// `CLERK_REVIEW → SA_REVIEW → AO_REVIEW → CLOSED/REJECTED`, with a
/// citizen query state reachable from every officer stage.
pub fn three_officer_chain() -> WorkflowDefinition {
    let clerk = vec![RoleId::new("CLERK")];
    let sa = vec![RoleId::new("SENIOR_ASSISTANT")];
    let ao = vec![RoleId::new("ACCOUNT_OFFICER")];

    let mut def = WorkflowDefinition::new(
        ServiceKey::new("water_connection"),
        1,
        "Water Connection Approval",
    )
    .with_query_policy(QueryPolicy {
        max_cycles: 3,
        pause_sla: true,
        response_due_days: 7,
        query_state: StateId::new("CITIZEN_QUERY"),
    });

    def.add_state(
        StateDef::officer("CLERK_REVIEW", "Clerk Review", clerk.clone())
            .as_initial()
            .with_sla_days(3),
    )
    .expect("fixture state");
    def.add_state(
        StateDef::officer("SA_REVIEW", "Senior Assistant Review", sa.clone()).with_sla_days(5),
    )
    .expect("fixture state");
    def.add_state(
        StateDef::officer("AO_REVIEW", "Account Officer Review", ao.clone()).with_sla_days(5),
    )
    .expect("fixture state");
    def.add_state(StateDef::citizen("CITIZEN_QUERY", "Awaiting Citizen Response"))
        .expect("fixture state");
    def.add_state(StateDef::terminal(
        "CLOSED",
        "Closed",
        seva_types::DisposalType::Approved,
    ))
    .expect("fixture state");
    def.add_state(StateDef::terminal(
        "REJECTED",
        "Rejected",
        seva_types::DisposalType::Rejected,
    ))
    .expect("fixture state");

    def.add_transition(
        TransitionDef::new("clerk_forward", "CLERK_REVIEW", "SA_REVIEW", TriggerKind::Officer)
            .with_roles(clerk.clone())
            .with_guard("applicant.age >= 18 && fee_paid == true")
            .with_action(ActionSpec::AssignTask {
                role: RoleId::new("SENIOR_ASSISTANT"),
            }),
    )
    .expect("fixture transition");
    def.add_transition(
        TransitionDef::new("clerk_reject", "CLERK_REVIEW", "REJECTED", TriggerKind::Officer)
            .with_roles(clerk.clone())
            .with_decision(DecisionOutcome::Reject)
            .with_action(ActionSpec::Notify {
                event_type: "application_rejected".into(),
                template: "sms_rejected".into(),
                recipients: vec!["applicant".into()],
            }),
    )
    .expect("fixture transition");
    def.add_transition(
        TransitionDef::new("sa_forward", "SA_REVIEW", "AO_REVIEW", TriggerKind::Officer)
            .with_roles(sa.clone())
            .with_action(ActionSpec::AssignTask {
                role: RoleId::new("ACCOUNT_OFFICER"),
            }),
    )
    .expect("fixture transition");
    def.add_transition(
        TransitionDef::new("sa_return", "SA_REVIEW", "CLERK_REVIEW", TriggerKind::Officer)
            .with_roles(sa.clone())
            .with_decision(DecisionOutcome::Return),
    )
    .expect("fixture transition");
    def.add_transition(
        TransitionDef::new("sa_reject", "SA_REVIEW", "REJECTED", TriggerKind::Officer)
            .with_roles(sa)
            .with_decision(DecisionOutcome::Reject),
    )
    .expect("fixture transition");
    def.add_transition(
        TransitionDef::new("ao_approve", "AO_REVIEW", "CLOSED", TriggerKind::Officer)
            .with_roles(ao.clone())
            .with_decision(DecisionOutcome::Approve)
            .with_action(ActionSpec::GenerateCertificate {
                template_id: "approval_cert".into(),
            })
            .with_action(ActionSpec::Notify {
                event_type: "application_approved".into(),
                template: "sms_approved".into(),
                recipients: vec!["applicant".into()],
            }),
    )
    .expect("fixture transition");
    def.add_transition(
        TransitionDef::new("ao_reject", "AO_REVIEW", "REJECTED", TriggerKind::Officer)
            .with_roles(ao)
            .with_decision(DecisionOutcome::Reject),
    )
    .expect("fixture transition");

    def
}

/// A clerk actor for tests and examples.
pub fn clerk() -> Actor {
    Actor::officer("off-clerk", vec![RoleId::new("CLERK")])
}
