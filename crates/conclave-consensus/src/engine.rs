//! Consensus Engine (spec §4.2): reduces N models' proposed actions to at most one
//! dispatchable `Action` per cycle.
//!
//! Selection is two-stage: group candidates by `ActionType`, pick the type with the
//! most votes (ties broken by lowest `ActionType::priority()` — "more conservative
//! wins"), then reduce every parameter of the winning group through its schema's
//! declared `ConsensusRule`. A single parameter failing to reach consensus fails the
//! whole cycle (`Error::NoConsensus`); nothing partially dispatches.

use conclave_core::{Action, ActionSchema, ActionType, ConsensusRule, Error, Result, Value};
use conclave_llm::{EmbedOpts, LlmProvider};
use std::collections::BTreeMap;

use crate::cost::CostAccumulator;

/// One model's proposed action for the current cycle.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub model: String,
    pub action: Action,
}

/// Reduces a cycle's candidates to a single consensus `Action`.
///
/// `registry` is the closed Action Registry (`conclave_core::action::registry()`);
/// `embedder` backs `semantic_similarity`; `cost` accumulates embedding spend across
/// the whole reduction, success or failure.
pub async fn merge_candidates(
    candidates: &[Candidate],
    registry: &BTreeMap<ActionType, ActionSchema>,
    embedder: &dyn LlmProvider,
    cost: &mut CostAccumulator,
) -> Result<Action> {
    if candidates.is_empty() {
        return Err(Error::NoConsensus);
    }

    let winner_type = select_action_type(candidates);
    let schema = registry
        .get(&winner_type)
        .ok_or(Error::UnknownAction(winner_type.as_str().to_string()))?;

    let group: Vec<&Action> = candidates
        .iter()
        .filter(|c| c.action.action_type == winner_type)
        .map(|c| &c.action)
        .collect();

    let mut params = BTreeMap::new();
    for spec in schema.required.iter().chain(schema.optional.iter()) {
        let values: Vec<&Value> = group.iter().filter_map(|a| a.params.get(&spec.name)).collect();
        if values.is_empty() {
            continue;
        }
        let merged = apply_rule(spec.consensus_rule, &values, registry, embedder, cost).await?;
        params.insert(spec.name.clone(), merged);
    }

    Ok(Action {
        action_type: winner_type,
        params,
        reasoning: group.iter().find_map(|a| a.reasoning.clone()),
    })
}

fn select_action_type(candidates: &[Candidate]) -> ActionType {
    let mut counts: BTreeMap<ActionType, usize> = BTreeMap::new();
    for c in candidates {
        *counts.entry(c.action.action_type).or_insert(0) += 1;
    }
    let max_votes = *counts.values().max().unwrap_or(&0);
    counts
        .into_iter()
        .filter(|(_, n)| *n == max_votes)
        .map(|(t, _)| t)
        .min_by_key(|t| t.priority())
        .expect("candidates is non-empty")
}

async fn apply_rule(
    rule: ConsensusRule,
    values: &[&Value],
    registry: &BTreeMap<ActionType, ActionSchema>,
    embedder: &dyn LlmProvider,
    cost: &mut CostAccumulator,
) -> Result<Value> {
    match rule {
        ConsensusRule::ExactMatch => exact_match(values),
        ConsensusRule::SemanticSimilarity { threshold } => {
            semantic_similarity(values, threshold, embedder, cost).await
        }
        ConsensusRule::ModeSelection => Ok(mode_selection(values)),
        ConsensusRule::UnionMerge => Ok(union_merge(values)),
        ConsensusRule::StructuralMerge => Ok(structural_merge(values)),
        ConsensusRule::Percentile { p } => percentile(values, p),
        ConsensusRule::BatchSequenceMerge => {
            Box::pin(batch_sequence_merge(values, registry, embedder, cost)).await
        }
        ConsensusRule::WaitParameter => wait_parameter(values),
    }
}

fn exact_match(values: &[&Value]) -> Result<Value> {
    let first = values[0];
    if values.iter().all(|v| *v == first) {
        Ok(first.clone())
    } else {
        Err(Error::NoConsensus)
    }
}

async fn semantic_similarity(
    values: &[&Value],
    threshold: f64,
    embedder: &dyn LlmProvider,
    cost: &mut CostAccumulator,
) -> Result<Value> {
    let first = values[0];
    if values.iter().all(|v| *v == first) {
        return Ok(first.clone());
    }

    let strs: Vec<&str> = values
        .iter()
        .map(|v| v.as_str().ok_or(Error::Internal("semantic_similarity on non-string value".into())))
        .collect::<Result<_>>()?;

    let mut embeddings = Vec::with_capacity(strs.len());
    for s in &strs {
        let emb = embedder
            .embed(s, EmbedOpts::default())
            .await
            .map_err(|e| Error::Internal(format!("embedding failed: {e}")))?;
        cost.record_call();
        embeddings.push(emb);
    }

    let reference = &embeddings[0];
    let all_similar = embeddings
        .iter()
        .skip(1)
        .all(|e| cosine_similarity(reference, e) >= threshold);

    if all_similar {
        Ok(first.clone())
    } else {
        Err(Error::NoConsensus)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

/// Most frequent value; first-encountered value wins ties.
fn mode_selection(values: &[&Value]) -> Value {
    let mut order: Vec<&Value> = Vec::new();
    let mut counts: Vec<(usize, usize)> = Vec::new(); // (order index, count)
    for v in values {
        if let Some(idx) = order.iter().position(|o| *o == v) {
            counts[idx].1 += 1;
        } else {
            order.push(v);
            counts.push((order.len() - 1, 1));
        }
    }
    let best = counts.iter().max_by_key(|(_, n)| *n).expect("values is non-empty");
    order[best.0].clone()
}

/// Flattens the candidates' lists and dedupes, preserving first-seen order.
fn union_merge(values: &[&Value]) -> Value {
    let mut seen = Vec::new();
    for v in values {
        let items: Vec<Value> = match v {
            Value::List(l) => l.clone(),
            other => vec![(*other).clone()],
        };
        for item in items {
            if !seen.contains(&item) {
                seen.push(item);
            }
        }
    }
    Value::List(seen)
}

/// Recursively merges map values; later candidates win on scalar conflicts.
fn structural_merge(values: &[&Value]) -> Value {
    values
        .iter()
        .map(|v| (*v).clone())
        .reduce(|acc, v| structural_merge_pair(acc, v))
        .unwrap_or(Value::Null)
}

fn structural_merge_pair(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Map(mut ma), Value::Map(mb)) => {
            for (k, v) in mb {
                let merged = match ma.remove(&k) {
                    Some(existing) => structural_merge_pair(existing, v),
                    None => v,
                };
                ma.insert(k, merged);
            }
            Value::Map(ma)
        }
        (_, b) => b,
    }
}

/// Linear-interpolated percentile over numeric values; falls back to `mode_selection`
/// when no value is numeric.
fn percentile(values: &[&Value], p: f64) -> Result<Value> {
    let mut nums: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
    if nums.is_empty() {
        return Ok(mode_selection(values));
    }
    nums.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let rank = p * (nums.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    let interpolated = nums[lo] + (nums[hi] - nums[lo]) * frac;

    // Preserve the caller's numeric flavor: integral inputs stay integral.
    if values.iter().all(|v| matches!(v, Value::Int(_))) {
        Ok(Value::Int(interpolated.round() as i64))
    } else {
        Ok(Value::Float(interpolated))
    }
}

enum WaitUnit {
    Bool(bool),
    Num(f64),
}

/// Boolean/numeric hybrid rule (spec §4.2, scenario S1).
///
/// All-false ⇒ false. All-true ⇒ true. Mixed booleans with ≥3 values and any true ⇒
/// true. All-numeric ⇒ integer median. Otherwise each value converts to a number
/// (`false` → 0, `true` → `max(max(numeric values), 30)`, numbers pass through
/// unchanged) and the integer median of the converted sequence is returned.
fn wait_parameter(values: &[&Value]) -> Result<Value> {
    let units: Vec<WaitUnit> = values
        .iter()
        .map(|v| match v {
            Value::Bool(b) => Ok(WaitUnit::Bool(*b)),
            other => other
                .as_f64()
                .map(WaitUnit::Num)
                .ok_or_else(|| Error::InvalidEnum {
                    param: "duration".into(),
                    value: format!("{other:?}"),
                }),
        })
        .collect::<Result<_>>()?;

    if units.iter().all(|u| matches!(u, WaitUnit::Bool(_))) {
        let bools: Vec<bool> = units
            .iter()
            .map(|u| match u {
                WaitUnit::Bool(b) => *b,
                WaitUnit::Num(_) => unreachable!(),
            })
            .collect();
        if bools.iter().all(|b| !b) {
            return Ok(Value::Bool(false));
        }
        if bools.iter().all(|b| *b) {
            return Ok(Value::Bool(true));
        }
        if bools.len() >= 3 && bools.iter().any(|b| *b) {
            return Ok(Value::Bool(true));
        }
    }

    let max_numeric = units.iter().fold(0.0_f64, |m, u| match u {
        WaitUnit::Num(n) => m.max(*n),
        WaitUnit::Bool(_) => m,
    });
    let true_value = max_numeric.max(30.0);

    let converted: Vec<f64> = units
        .iter()
        .map(|u| match u {
            WaitUnit::Bool(true) => true_value,
            WaitUnit::Bool(false) => 0.0,
            WaitUnit::Num(n) => *n,
        })
        .collect();

    Ok(Value::Int(median_int(&converted)))
}

fn median_int(values: &[f64]) -> i64 {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = v.len();
    let median = if n % 2 == 1 {
        v[n / 2]
    } else {
        (v[n / 2 - 1] + v[n / 2]) / 2.0
    };
    median.round() as i64
}

/// Merges equal-length sub-action sequences (batch_sync/batch_async) position by
/// position; every candidate must agree on each position's action type.
async fn batch_sequence_merge(
    values: &[&Value],
    registry: &BTreeMap<ActionType, ActionSchema>,
    embedder: &dyn LlmProvider,
    cost: &mut CostAccumulator,
) -> Result<Value> {
    let sequences: Vec<&[Value]> = values
        .iter()
        .map(|v| v.as_list().ok_or(Error::Internal("batch_sequence_merge on non-list value".into())))
        .collect::<Result<_>>()?;

    let len = sequences[0].len();
    if sequences.iter().any(|s| s.len() != len) {
        return Err(Error::SequenceLengthMismatch);
    }

    let mut merged = Vec::with_capacity(len);
    for i in 0..len {
        let elements: Vec<Action> = sequences
            .iter()
            .map(|s| action_from_value(&s[i]))
            .collect::<Result<_>>()?;

        let first_type = elements[0].action_type;
        if elements.iter().any(|a| a.action_type != first_type) {
            return Err(Error::SequenceMismatch(i));
        }

        let candidates: Vec<Candidate> = elements
            .into_iter()
            .enumerate()
            .map(|(n, action)| Candidate {
                model: format!("batch-position-{i}-{n}"),
                action,
            })
            .collect();

        let merged_action = Box::pin(merge_candidates(&candidates, registry, embedder, cost)).await?;
        merged.push(value_from_action(&merged_action));
    }

    Ok(Value::List(merged))
}

fn action_from_value(v: &Value) -> Result<Action> {
    let map = v.as_map().ok_or(Error::Internal("batch sub-action is not a map".into()))?;
    let type_str = map
        .get("type")
        .and_then(Value::as_str)
        .ok_or(Error::Internal("batch sub-action missing type".into()))?;
    let action_type =
        ActionType::from_str(type_str).ok_or_else(|| Error::UnknownAction(type_str.to_string()))?;
    let params = match map.get("params") {
        Some(Value::Map(m)) => m.clone(),
        _ => Default::default(),
    };
    Ok(Action::new(action_type, params))
}

fn value_from_action(action: &Action) -> Value {
    let mut m = BTreeMap::new();
    m.insert("type".to_string(), Value::Str(action.action_type.as_str().to_string()));
    m.insert("params".to_string(), Value::Map(action.params.clone()));
    Value::Map(m)
}
