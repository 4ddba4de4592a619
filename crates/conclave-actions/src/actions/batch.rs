//! `batch_sync` and `batch_async`: Router-level execution of a consensus-merged list
//! of sub-actions (spec §4.3, §6). Distinct from `conclave_consensus`'s
//! `batch_sequence_merge`, which only merges *candidate* batches before one of these
//! ever runs — by the time either function here sees an `actions` list, it is already
//! a single agreed-upon sequence of concrete sub-actions.
//!
//! Sub-actions are dispatched through the same `dispatch_one` callback the Router uses
//! for top-level actions, so every sub-action still passes through validation,
//! truncation, and redaction exactly as if it had been dispatched on its own.

use conclave_core::{Action, ActionType, Error, Result, Value};
use std::collections::BTreeMap;

/// One sub-action's outcome, keyed by its position in the batch.
#[derive(Clone, Debug)]
pub struct BatchItemResult {
    pub index: usize,
    pub outcome: Result<Value>,
}

pub fn parse_sub_actions(actions: &Value) -> Result<Vec<Action>> {
    let list = actions
        .as_list()
        .ok_or_else(|| Error::MissingRequiredParam("actions".into()))?;
    list.iter().map(sub_action_from_value).collect()
}

fn sub_action_from_value(v: &Value) -> Result<Action> {
    let map = v
        .as_map()
        .ok_or_else(|| Error::MissingRequiredParam("actions[].type".into()))?;
    let type_str = map
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MissingRequiredParam("actions[].type".into()))?;
    let action_type = ActionType::from_str(type_str).ok_or_else(|| Error::UnknownAction(type_str.into()))?;
    if action_type.is_batch() {
        return Err(Error::XorViolation(vec!["actions".into()]));
    }
    let params = match map.get("params") {
        Some(Value::Map(p)) => p.clone(),
        Some(_) => return Err(Error::MissingRequiredParam("actions[].params".into())),
        None => BTreeMap::new(),
    };
    Ok(Action::new(action_type, params))
}

/// `batch_sync`: runs sub-actions strictly in order, stopping at the first failure.
/// Returns every result obtained before (and including) the failure.
pub async fn run_sync<F, Fut>(sub_actions: &[Action], mut dispatch_one: F) -> Vec<BatchItemResult>
where
    F: FnMut(Action) -> Fut,
    Fut: std::future::Future<Output = Result<Value>>,
{
    let mut results = Vec::with_capacity(sub_actions.len());
    for (index, action) in sub_actions.iter().enumerate() {
        let outcome = dispatch_one(action.clone()).await;
        let failed = outcome.is_err();
        results.push(BatchItemResult { index, outcome });
        if failed {
            break;
        }
    }
    results
}

/// `batch_async`: runs every sub-action concurrently and reports every outcome,
/// regardless of individual failures (spec: "report batch_completed").
pub async fn run_async<F, Fut>(sub_actions: &[Action], dispatch_one: F) -> Vec<BatchItemResult>
where
    F: Fn(Action) -> Fut,
    Fut: std::future::Future<Output = Result<Value>>,
{
    let futures = sub_actions.iter().enumerate().map(|(index, action)| {
        let fut = dispatch_one(action.clone());
        async move {
            let outcome = fut.await;
            BatchItemResult { index, outcome }
        }
    });
    futures::future::join_all(futures).await
}
