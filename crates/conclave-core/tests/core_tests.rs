//! Data model, Action Registry, and error taxonomy tests.

use conclave_core::action::{registry, ActionType};
use conclave_core::model::{Agent, BudgetData, BudgetMode, Profile};
use conclave_core::value::Value;
use conclave_core::{AgentId, Error, TaskId};
use std::collections::BTreeMap;

fn profile() -> Profile {
    Profile {
        name: "default".into(),
        model_pool: vec!["model-a".into(), "model-b".into()],
        capability_groups: vec!["shell".into()],
        default_prompt_fragments: BTreeMap::new(),
    }
}

#[test]
fn agent_ids_are_unique_and_display() {
    let a = AgentId::new();
    let b = AgentId::new();
    assert_ne!(a, b);
    assert!(!a.as_str().is_empty());
    assert_eq!(format!("{a}"), a.as_str());
}

#[test]
fn agent_new_starts_unlimited_budget() {
    let agent = Agent::new(TaskId::new(), None, &profile());
    assert!(matches!(agent.budget_data.mode, BudgetMode::Na));
    assert_eq!(agent.children.len(), 0);
    assert!(!agent.dismissing);
}

#[test]
fn agent_child_tracking_idempotent_p8() {
    let mut agent = Agent::new(TaskId::new(), None, &profile());
    let child = AgentId::new();
    agent.add_child_idempotent(child.clone());
    agent.add_child_idempotent(child.clone());
    agent.add_child_idempotent(child.clone());
    assert_eq!(agent.children.len(), 1);
    agent.remove_child(&child);
    assert!(agent.children.is_empty());
}

#[test]
fn budget_data_allocated_starts_at_zero_committed() {
    let b = BudgetData::allocated("100".parse().unwrap());
    assert_eq!(b.committed, rust_decimal::Decimal::ZERO);
}

#[test]
fn registry_has_all_21_actions_with_correct_priorities() {
    let reg = registry();
    assert_eq!(reg.len(), 21);
    assert_eq!(reg[&ActionType::Wait].priority(), 1);
    assert_eq!(reg[&ActionType::SpawnChild].priority(), 9);
    assert_eq!(reg[&ActionType::DismissChild].priority(), 8);
    assert_eq!(reg[&ActionType::Shell].priority(), 10);
    assert_eq!(reg[&ActionType::BatchSync].priority(), 11);
    assert_eq!(reg[&ActionType::BatchAsync].priority(), 12);
}

#[test]
fn shell_schema_declares_command_xor_check_id() {
    let reg = registry();
    let shell = &reg[&ActionType::Shell];
    assert_eq!(shell.xor_groups.len(), 1);
    let alts = &shell.xor_groups[0];
    assert!(alts.iter().any(|a| a == &vec!["command".to_string()]));
    assert!(alts.iter().any(|a| a == &vec!["check_id".to_string()]));
}

#[test]
fn action_type_round_trips_through_str() {
    for a in ActionType::ALL {
        let s = a.as_str();
        assert_eq!(ActionType::from_str(s), Some(a));
    }
}

#[test]
fn action_type_from_str_rejects_unknown() {
    assert_eq!(ActionType::from_str("teleport"), None);
}

#[test]
fn value_lenient_bool_coercion() {
    assert_eq!(Value::from("true").as_bool(), Some(true));
    assert_eq!(Value::Bool(false).as_bool(), Some(false));
    assert_eq!(Value::Int(1).as_bool(), None);
}

#[test]
fn value_empty_map_is_empty_container() {
    let v = Value::Map(BTreeMap::new());
    assert!(v.is_empty_container());
    let v2 = Value::List(vec![]);
    assert!(v2.is_empty_container());
    let v3 = Value::Str("x".into());
    assert!(!v3.is_empty_container());
}

#[test]
fn error_kind_classification() {
    assert!(Error::NotParent.is_authorization());
    assert!(Error::ParentDismissing.is_authorization());
    assert!(!Error::RequestTimeout.is_authorization());

    assert!(Error::RequestTimeout.is_transient());
    assert!(Error::RateLimitExceeded.is_transient());
    assert!(!Error::NotParent.is_transient());

    assert!(Error::BudgetRequired.is_budget_denial());
    assert!(Error::InsufficientParentBudget.is_budget_denial());
    assert!(!Error::BudgetRequired.is_transient());
}
