//! Consensus Engine scenario and property tests (spec §8).

use async_trait::async_trait;
use conclave_consensus::{merge_candidates, Candidate, CostAccumulator};
use conclave_core::{action::registry, Action, ActionType, Value};
use conclave_llm::{EmbedOpts, GenerateOpts, GenerationResponse, LlmError, LlmMessage, LlmProvider, LlmResult, Usage};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Embeds a string to a one-hot-ish vector keyed by its first byte, so identical
/// strings embed identically and distinct strings diverge — enough to drive
/// `semantic_similarity` deterministically in tests without a real model.
struct FakeEmbedder;

#[async_trait]
impl LlmProvider for FakeEmbedder {
    fn name(&self) -> &str {
        "fake"
    }

    fn models(&self) -> &[&str] {
        &["fake-model"]
    }

    async fn generate_text(
        &self,
        _model: &str,
        _messages: &[LlmMessage],
        _opts: GenerateOpts,
        _cancel: Option<CancellationToken>,
    ) -> LlmResult<GenerationResponse> {
        Ok(GenerationResponse {
            text: String::new(),
            usage: Usage::default(),
        })
    }

    async fn embed(&self, text: &str, _opts: EmbedOpts) -> LlmResult<Vec<f32>> {
        if text.is_empty() {
            return Err(LlmError::ProviderError("empty".into()));
        }
        // Byte histogram: identical strings embed identically, strings with disjoint
        // character sets embed orthogonally, giving a deterministic cosine similarity.
        let mut hist = [0f32; 256];
        for b in text.bytes() {
            hist[b as usize] += 1.0;
        }
        Ok(hist.to_vec())
    }
}

fn wait_action(duration: Value) -> Action {
    let mut params = BTreeMap::new();
    params.insert("duration".to_string(), duration);
    Action::new(ActionType::Wait, params)
}

fn candidate(model: &str, action: Action) -> Candidate {
    Candidate {
        model: model.to_string(),
        action,
    }
}

#[tokio::test]
async fn s1_wait_parameter_mixed_bool_numeric_median_is_45() {
    let reg = registry();
    let embedder = FakeEmbedder;
    let mut cost = CostAccumulator::default();

    let candidates = vec![
        candidate("m1", wait_action(Value::Bool(false))),
        candidate("m2", wait_action(Value::Int(30))),
        candidate("m3", wait_action(Value::Bool(true))),
        candidate("m4", wait_action(Value::Int(60))),
    ];

    let merged = merge_candidates(&candidates, &reg, &embedder, &mut cost).await.unwrap();
    assert_eq!(merged.action_type, ActionType::Wait);
    assert_eq!(merged.params.get("duration"), Some(&Value::Int(45)));
}

#[tokio::test]
async fn wait_parameter_all_false_is_false() {
    let reg = registry();
    let embedder = FakeEmbedder;
    let mut cost = CostAccumulator::default();

    let candidates = vec![
        candidate("m1", wait_action(Value::Bool(false))),
        candidate("m2", wait_action(Value::Bool(false))),
    ];
    let merged = merge_candidates(&candidates, &reg, &embedder, &mut cost).await.unwrap();
    assert_eq!(merged.params.get("duration"), Some(&Value::Bool(false)));
}

#[tokio::test]
async fn wait_parameter_all_true_is_true() {
    let reg = registry();
    let embedder = FakeEmbedder;
    let mut cost = CostAccumulator::default();

    let candidates = vec![
        candidate("m1", wait_action(Value::Bool(true))),
        candidate("m2", wait_action(Value::Bool(true))),
        candidate("m3", wait_action(Value::Bool(true))),
    ];
    let merged = merge_candidates(&candidates, &reg, &embedder, &mut cost).await.unwrap();
    assert_eq!(merged.params.get("duration"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn wait_parameter_mixed_three_with_any_true_is_true() {
    let reg = registry();
    let embedder = FakeEmbedder;
    let mut cost = CostAccumulator::default();

    let candidates = vec![
        candidate("m1", wait_action(Value::Bool(false))),
        candidate("m2", wait_action(Value::Bool(false))),
        candidate("m3", wait_action(Value::Bool(true))),
    ];
    let merged = merge_candidates(&candidates, &reg, &embedder, &mut cost).await.unwrap();
    assert_eq!(merged.params.get("duration"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn s2_semantic_similarity_identical_strings_short_circuit_without_embedding() {
    let reg = registry();
    let embedder = FakeEmbedder;
    let mut cost = CostAccumulator::default();

    let mut params = BTreeMap::new();
    params.insert("summary".to_string(), Value::Str("orienting toward goal X".to_string()));
    let action = Action::new(ActionType::Orient, params);

    let candidates = vec![
        candidate("m1", action.clone()),
        candidate("m2", action.clone()),
        candidate("m3", action),
    ];

    let merged = merge_candidates(&candidates, &reg, &embedder, &mut cost).await.unwrap();
    assert_eq!(
        merged.params.get("summary"),
        Some(&Value::Str("orienting toward goal X".to_string()))
    );
    assert_eq!(cost.embedding_calls, 0, "identical values must short-circuit embedding calls");
}

#[tokio::test]
async fn semantic_similarity_divergent_strings_fail_consensus() {
    let reg = registry();
    let embedder = FakeEmbedder;
    let mut cost = CostAccumulator::default();

    let mut p1 = BTreeMap::new();
    p1.insert("summary".to_string(), Value::Str("aaaaaaaaaa".to_string()));
    let mut p2 = BTreeMap::new();
    p2.insert("summary".to_string(), Value::Str("bbbbbbbbbb".to_string()));

    let candidates = vec![
        candidate("m1", Action::new(ActionType::Orient, p1)),
        candidate("m2", Action::new(ActionType::Orient, p2)),
    ];

    let err = merge_candidates(&candidates, &reg, &embedder, &mut cost).await.unwrap_err();
    assert!(matches!(err, conclave_core::Error::NoConsensus));
    assert_eq!(cost.embedding_calls, 2);
}

#[tokio::test]
async fn action_type_selection_breaks_ties_by_lowest_priority() {
    let reg = registry();
    let embedder = FakeEmbedder;
    let mut cost = CostAccumulator::default();

    // wait (priority 1) vs shell (priority 10), tied 1-1 vote: wait wins.
    let mut wait_params = BTreeMap::new();
    wait_params.insert("duration".to_string(), Value::Int(10));
    let mut shell_params = BTreeMap::new();
    shell_params.insert("command".to_string(), Value::Str("ls".to_string()));

    let candidates = vec![
        candidate("m1", Action::new(ActionType::Wait, wait_params)),
        candidate("m2", Action::new(ActionType::Shell, shell_params)),
    ];

    let merged = merge_candidates(&candidates, &reg, &embedder, &mut cost).await.unwrap();
    assert_eq!(merged.action_type, ActionType::Wait);
}

#[tokio::test]
async fn p6_merge_is_deterministic_across_repeated_runs() {
    let reg = registry();
    let embedder = FakeEmbedder;

    let candidates = vec![
        candidate("m1", wait_action(Value::Bool(false))),
        candidate("m2", wait_action(Value::Int(30))),
        candidate("m3", wait_action(Value::Bool(true))),
        candidate("m4", wait_action(Value::Int(60))),
    ];

    let mut first_cost = CostAccumulator::default();
    let first = merge_candidates(&candidates, &reg, &embedder, &mut first_cost).await.unwrap();

    for _ in 0..5 {
        let mut cost = CostAccumulator::default();
        let again = merge_candidates(&candidates, &reg, &embedder, &mut cost).await.unwrap();
        assert_eq!(again.params, first.params);
        assert_eq!(again.action_type, first.action_type);
    }
}

#[tokio::test]
async fn union_merge_dedupes_preserving_first_seen_order() {
    let reg = registry();
    let embedder = FakeEmbedder;
    let mut cost = CostAccumulator::default();

    let mut p1 = BTreeMap::new();
    p1.insert(
        "downstream_constraints".to_string(),
        Value::List(vec![Value::Str("a".into()), Value::Str("b".into())]),
    );
    p1.insert("task_description".to_string(), Value::Str("do thing".into()));
    p1.insert("profile_name".to_string(), Value::Str("worker".into()));

    let mut p2 = BTreeMap::new();
    p2.insert(
        "downstream_constraints".to_string(),
        Value::List(vec![Value::Str("b".into()), Value::Str("c".into())]),
    );
    p2.insert("task_description".to_string(), Value::Str("do thing".into()));
    p2.insert("profile_name".to_string(), Value::Str("worker".into()));

    let candidates = vec![
        candidate("m1", Action::new(ActionType::SpawnChild, p1)),
        candidate("m2", Action::new(ActionType::SpawnChild, p2)),
    ];

    let merged = merge_candidates(&candidates, &reg, &embedder, &mut cost).await.unwrap();
    assert_eq!(
        merged.params.get("downstream_constraints"),
        Some(&Value::List(vec![Value::Str("a".into()), Value::Str("b".into()), Value::Str("c".into())]))
    );
}

#[tokio::test]
async fn percentile_returns_median_for_budget() {
    let reg = registry();
    let embedder = FakeEmbedder;
    let mut cost = CostAccumulator::default();

    let mut p1 = BTreeMap::new();
    p1.insert("child_id".to_string(), Value::Str("c1".into()));
    p1.insert("new_allocation".to_string(), Value::Int(10));
    let mut p2 = BTreeMap::new();
    p2.insert("child_id".to_string(), Value::Str("c1".into()));
    p2.insert("new_allocation".to_string(), Value::Int(20));
    let mut p3 = BTreeMap::new();
    p3.insert("child_id".to_string(), Value::Str("c1".into()));
    p3.insert("new_allocation".to_string(), Value::Int(30));

    let candidates = vec![
        candidate("m1", Action::new(ActionType::AdjustBudget, p1)),
        candidate("m2", Action::new(ActionType::AdjustBudget, p2)),
        candidate("m3", Action::new(ActionType::AdjustBudget, p3)),
    ];

    let merged = merge_candidates(&candidates, &reg, &embedder, &mut cost).await.unwrap();
    assert_eq!(merged.params.get("new_allocation"), Some(&Value::Int(20)));
}

#[tokio::test]
async fn structural_merge_lets_later_candidate_win_scalar_conflicts() {
    let reg = registry();
    let embedder = FakeEmbedder;
    let mut cost = CostAccumulator::default();

    let mut p1 = BTreeMap::new();
    p1.insert("name".to_string(), Value::Str("s1".into()));
    p1.insert("content".to_string(), Value::Str("first".into()));

    let mut p2 = BTreeMap::new();
    p2.insert("name".to_string(), Value::Str("s1".into()));
    p2.insert("content".to_string(), Value::Str("second".into()));

    let candidates = vec![
        candidate("m1", Action::new(ActionType::CreateSkill, p1)),
        candidate("m2", Action::new(ActionType::CreateSkill, p2)),
    ];

    let merged = merge_candidates(&candidates, &reg, &embedder, &mut cost).await.unwrap();
    assert_eq!(merged.params.get("content"), Some(&Value::Str("second".into())));
}

#[tokio::test]
async fn batch_sequence_merge_rejects_length_mismatch() {
    let reg = registry();
    let embedder = FakeEmbedder;
    let mut cost = CostAccumulator::default();

    fn sub(action_type: &str) -> Value {
        let mut m = BTreeMap::new();
        m.insert("type".to_string(), Value::Str(action_type.to_string()));
        m.insert("params".to_string(), Value::Map(BTreeMap::new()));
        Value::Map(m)
    }

    let mut p1 = BTreeMap::new();
    p1.insert("actions".to_string(), Value::List(vec![sub("orient")]));
    let mut p2 = BTreeMap::new();
    p2.insert("actions".to_string(), Value::List(vec![sub("orient"), sub("orient")]));

    let candidates = vec![
        candidate("m1", Action::new(ActionType::BatchSync, p1)),
        candidate("m2", Action::new(ActionType::BatchSync, p2)),
    ];

    let err = merge_candidates(&candidates, &reg, &embedder, &mut cost).await.unwrap_err();
    assert!(matches!(err, conclave_core::Error::SequenceLengthMismatch));
}
