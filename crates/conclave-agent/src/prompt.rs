//! Builds the per-model prompt from `prompt_fields` and appends a raw-text model
//! reply as an action candidate (spec §4.1 steps 1-3). Parsing a model's free-form
//! reply into a typed `Action` is the one place this crate bridges untyped model
//! text into the closed Action Registry; the Validator (in `conclave-actions`)
//! still has the final say before anything dispatches.

use conclave_core::model::{Agent, HistoryEntryKind};
use conclave_core::{Action, ActionType, Error, Result, Value};
use conclave_llm::{LlmMessage, Role};

/// Flattens `prompt_fields` into the single system framing every model sees,
/// independent of its own condensed history (spec §3: the three-zone record).
pub fn system_prompt(agent: &Agent) -> String {
    let mut sections = Vec::new();
    if let Some(ctx) = &agent.prompt_fields.injected.global_context {
        sections.push(format!("Global context:\n{ctx}"));
    }
    if !agent.prompt_fields.injected.global_constraints.is_empty() {
        sections.push(format!(
            "Global constraints:\n- {}",
            agent.prompt_fields.injected.global_constraints.join("\n- ")
        ));
    }
    sections.push(format!("Task: {}", agent.prompt_fields.provided.task_description));
    if let Some(sc) = &agent.prompt_fields.provided.success_criteria {
        sections.push(format!("Success criteria: {sc}"));
    }
    if let Some(ic) = &agent.prompt_fields.provided.immediate_context {
        sections.push(format!("Immediate context: {ic}"));
    }
    if let Some(ag) = &agent.prompt_fields.provided.approach_guidance {
        sections.push(format!("Approach guidance: {ag}"));
    }
    if !agent.prompt_fields.transformed.narrative.is_empty() {
        sections.push(format!("Orientation so far:\n{}", agent.prompt_fields.transformed.narrative));
    }
    if !agent.prompt_fields.transformed.sibling_summaries.is_empty() {
        sections.push(format!(
            "Sibling summaries:\n- {}",
            agent.prompt_fields.transformed.sibling_summaries.join("\n- ")
        ));
    }
    sections.join("\n\n")
}

/// Converts one model's condensed history into the message vocabulary
/// `LlmProvider::generate_text` accepts.
pub fn messages_for_model(agent: &Agent, model: &str) -> Vec<LlmMessage> {
    agent
        .model_histories
        .get(model)
        .map(|entries| {
            entries
                .iter()
                .map(|e| match e.kind {
                    HistoryEntryKind::User => LlmMessage::user(e.content.clone()),
                    HistoryEntryKind::Agent | HistoryEntryKind::Decision => LlmMessage::assistant(e.content.clone()),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parses a model's raw reply into an `Action` candidate. Models are expected to
/// reply with a JSON object `{"type": ..., "params": {...}, "reasoning": ...}`,
/// possibly wrapped in surrounding prose — the core tolerates that by extracting
/// the outermost `{...}` span before parsing.
pub fn parse_candidate(text: &str) -> Result<Action> {
    let json_span = extract_json_object(text).ok_or_else(|| Error::Internal("no JSON object in model reply".into()))?;
    let parsed: serde_json::Value =
        serde_json::from_str(json_span).map_err(|e| Error::Internal(format!("malformed model reply: {e}")))?;
    let obj = parsed.as_object().ok_or_else(|| Error::Internal("model reply is not a JSON object".into()))?;

    let type_str = obj
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| Error::Internal("model reply missing 'type'".into()))?;
    let action_type = ActionType::from_str(type_str).ok_or_else(|| Error::UnknownAction(type_str.to_string()))?;

    let params = match obj.get("params") {
        Some(serde_json::Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v.clone())))
            .collect(),
        _ => std::collections::BTreeMap::new(),
    };
    let reasoning = obj.get("reasoning").and_then(serde_json::Value::as_str).map(str::to_string);

    Ok(Action {
        action_type,
        params,
        reasoning,
    })
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (i, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
