//! The Action Router (spec §4.4, §6): a short-lived, per-dispatch coordinator. One
//! `ActionRouter` is constructed (or reused, for the shell registry) per agent; one
//! `dispatch` call handles exactly one already-consensus-merged `Action`.
//!
//! Every dispatch runs the same pipeline: validate, execute, truncate, redact. Only
//! `ShellRegistry` survives across dispatches — everything else here is stateless.

use crate::actions::{answer_engine, batch, budget, control, file_read, file_write, network, secrets, send_message, shell, skills, tree};
use crate::context::{ActionContext, SpawnChildRequest};
use crate::actions::shell::ShellRegistry;
use crate::secret::Redactor;
use crate::validator::Validator;
use conclave_core::config::RouterConfig;
use conclave_core::{Action, ActionId, ActionSchema, ActionType, Error, Result, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub struct ActionRouter {
    registry: Arc<BTreeMap<ActionType, ActionSchema>>,
    config: RouterConfig,
    shell_registry: ShellRegistry,
}

impl ActionRouter {
    pub fn new(registry: Arc<BTreeMap<ActionType, ActionSchema>>, config: RouterConfig, shell_registry: ShellRegistry) -> Self {
        Self { registry, config, shell_registry }
    }

    /// Validates, executes, truncates, and redacts a single action. Recurses (through
    /// `dispatch_owned`) for `batch_sync`/`batch_async` sub-actions. Takes `self` as
    /// `Arc<Self>` because `batch_async` needs an owned, 'static handle on the Router
    /// to keep driving sub-actions from a background task after this call returns.
    pub async fn dispatch(self: Arc<Self>, action: &Action, ctx: Arc<dyn ActionContext>) -> Result<Value> {
        Validator::new(&self.registry).validate(action)?;
        let redactor = self.build_redactor(action, ctx.as_ref()).await;
        let raw = Arc::clone(&self).execute(action, ctx).await?;
        Ok(self.finish(raw, &redactor))
    }

    async fn build_redactor(&self, action: &Action, ctx: &dyn ActionContext) -> Redactor {
        let mut redactor = Redactor::new();
        let secret_param = match action.action_type {
            ActionType::GenerateSecret => Some("name"),
            ActionType::CallApi => Some("credential_name"),
            _ => None,
        };
        if let Some(param) = secret_param {
            if let Some(name) = action.params.get(param).and_then(Value::as_str) {
                if let Ok(value) = ctx.resolve_secret(name).await {
                    redactor.watch(value);
                }
            }
        }
        redactor
    }

    /// Scrubs and truncates every string leaf, recursing into `Map`/`List` so shell
    /// stdout/stderr and batch sub-results (both nested inside a `Value::Map`/`List`)
    /// are covered, not just a top-level `Value::Str` (spec.md: "scrubbing is total").
    fn finish(&self, value: Value, redactor: &Redactor) -> Value {
        match value {
            Value::Str(s) => Value::Str(self.truncate(&redactor.scrub(&s))),
            Value::Map(m) => Value::Map(m.into_iter().map(|(k, v)| (k, self.finish(v, redactor))).collect()),
            Value::List(items) => Value::List(items.into_iter().map(|v| self.finish(v, redactor)).collect()),
            other => other,
        }
    }

    fn truncate(&self, text: &str) -> String {
        let cap = self.config.truncation_bytes;
        if text.len() <= cap {
            return text.to_string();
        }
        let mut end = cap;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}\n[truncated at {cap} bytes]", &text[..end])
    }

    async fn execute(self: Arc<Self>, action: &Action, ctx: Arc<dyn ActionContext>) -> Result<Value> {
        let p = &action.params;
        match action.action_type {
            ActionType::Wait => {
                let duration = p.get("duration").ok_or_else(|| Error::MissingRequiredParam("duration".into()))?;
                control::wait(duration)?;
                Ok(Value::Null)
            }
            ActionType::Orient => {
                let summary = str_param(p, "summary")?.to_string();
                control::orient(&ctx, summary).await?;
                Ok(Value::Null)
            }
            ActionType::Todo => {
                let items = p.get("items").ok_or_else(|| Error::MissingRequiredParam("items".into()))?;
                control::todo(&ctx, items).await?;
                Ok(Value::Null)
            }
            ActionType::SendMessage => {
                let to = str_param(p, "to_agent_id")?;
                let content = str_param(p, "content")?.to_string();
                send_message::send_message(&ctx, to, content).await?;
                Ok(Value::Null)
            }
            ActionType::SpawnChild => {
                let req = spawn_request(p)?;
                let id = tree::spawn_child(&ctx, req).await?;
                Ok(Value::Str(id.as_str().to_string()))
            }
            ActionType::DismissChild => {
                let child_id = str_param(p, "child_id")?;
                let reason = p.get("reason").and_then(Value::as_str).map(str::to_string);
                tree::dismiss_child(&ctx, child_id, reason).await?;
                Ok(Value::Null)
            }
            ActionType::AdjustBudget => {
                let child_id = str_param(p, "child_id")?;
                let new_allocation = decimal_param(p, "new_allocation")?;
                budget::adjust_budget(&ctx, child_id, new_allocation).await?;
                Ok(Value::Null)
            }
            ActionType::RecordCost => {
                let amount = decimal_param(p, "amount")?;
                let reason = p.get("reason").and_then(Value::as_str).map(str::to_string);
                budget::record_cost(&ctx, amount, reason).await?;
                Ok(Value::Null)
            }
            ActionType::Shell => self.execute_shell(p, &ctx).await,
            ActionType::FetchWeb => {
                let url = str_param(p, "url")?;
                let method = p.get("method").and_then(Value::as_str);
                Ok(Value::Str(network::fetch_web(url, method).await?))
            }
            ActionType::CallApi => {
                let url = str_param(p, "url")?;
                let method = p.get("method").and_then(Value::as_str);
                let headers = string_map_param(p, "headers");
                let body = p.get("body").and_then(Value::as_str);
                let bearer = match p.get("credential_name").and_then(Value::as_str) {
                    Some(name) => Some(ctx.resolve_secret(name).await?),
                    None => None,
                };
                Ok(Value::Str(network::call_api(url, method, &headers, body, bearer.as_deref()).await?))
            }
            ActionType::CallMcp => {
                let tool = str_param(p, "tool")?;
                let args = string_map_param(p, "args");
                Ok(Value::Str(network::call_mcp(tool, &args).await?))
            }
            ActionType::FileRead => {
                let path = str_param(p, "path")?;
                let offset = p.get("offset").and_then(Value::as_f64).map(|f| f as i64);
                let limit = p.get("limit").and_then(Value::as_f64).map(|f| f as i64);
                Ok(Value::Str(file_read::read(ctx.workspace_root(), path, offset, limit).await?))
            }
            ActionType::FileWrite => self.execute_file_write(p, &ctx).await,
            ActionType::GenerateSecret => {
                let name = str_param(p, "name")?;
                let length = p.get("length").and_then(Value::as_f64).map(|f| f as usize).unwrap_or(32);
                secrets::generate_secret(&ctx, name, length).await?;
                Ok(Value::Null)
            }
            ActionType::SearchSecrets => {
                let query = str_param(p, "query")?;
                let names = secrets::search_secrets(&ctx, query).await?;
                Ok(Value::List(names.into_iter().map(Value::Str).collect()))
            }
            ActionType::AnswerEngine => {
                let question = str_param(p, "question")?;
                Ok(Value::Str(answer_engine::answer_engine(&ctx, question).await?))
            }
            ActionType::LearnSkills => {
                let names = string_list_param(p, "skill_names")?;
                skills::learn_skills(&ctx, names).await?;
                Ok(Value::Null)
            }
            ActionType::CreateSkill => {
                let name = str_param(p, "name")?;
                let content = str_param(p, "content")?;
                let permanent = p.get("permanent").and_then(Value::as_bool).unwrap_or(false);
                skills::create_skill(&ctx, name, content, permanent).await?;
                Ok(Value::Null)
            }
            ActionType::BatchSync => self.execute_batch_sync(p, ctx).await,
            ActionType::BatchAsync => self.execute_batch_async(p, ctx).await,
        }
    }

    async fn execute_shell(&self, p: &BTreeMap<String, Value>, ctx: &dyn ActionContext) -> Result<Value> {
        if let Some(check_id) = p.get("check_id").and_then(Value::as_str) {
            if p.get("terminate").and_then(Value::as_bool).unwrap_or(false) {
                self.shell_registry.terminate(check_id)?;
            }
            return Ok(shell_dispatch_to_value(self.shell_registry.check(check_id).await?));
        }

        let command = str_param(p, "command")?;
        let working_dir = shell::resolve_working_dir(ctx.workspace_root(), p.get("working_dir").and_then(Value::as_str))?;
        let check_id = ActionId::new().as_str().to_string();
        let threshold = Duration::from_millis(self.config.shell_smart_mode_threshold_ms);
        let dispatch = self.shell_registry.run(check_id.clone(), command, &working_dir, threshold).await?;
        Ok(shell_dispatch_to_value(dispatch))
    }

    async fn execute_file_write(&self, p: &BTreeMap<String, Value>, ctx: &dyn ActionContext) -> Result<Value> {
        let path = str_param(p, "path")?;
        let mode = str_param(p, "mode")?;
        match mode {
            "write" => {
                let content = str_param(p, "content")?;
                Ok(Value::Str(file_write::write(ctx.workspace_root(), path, content).await?))
            }
            "edit" => {
                let old_string = str_param(p, "old_string")?;
                let new_string = p.get("new_string").and_then(Value::as_str).unwrap_or("");
                let replace_all = p.get("replace_all").and_then(Value::as_bool).unwrap_or(false);
                Ok(Value::Str(
                    file_write::edit(ctx.workspace_root(), path, old_string, new_string, replace_all).await?,
                ))
            }
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }

    async fn execute_batch_sync(self: Arc<Self>, p: &BTreeMap<String, Value>, ctx: Arc<dyn ActionContext>) -> Result<Value> {
        let actions_value = p.get("actions").ok_or_else(|| Error::MissingRequiredParam("actions".into()))?;
        let sub_actions = batch::parse_sub_actions(actions_value)?;
        let results = batch::run_sync(&sub_actions, |a| Arc::clone(&self).dispatch_owned(a, ctx.clone())).await;
        Ok(batch_results_to_value(results))
    }

    /// `batch_async`: acknowledges immediately with a `status: "pending"` outcome and
    /// finishes the sub-actions on a detached task, which posts `batch_completed` back
    /// onto the owning agent's own mailbox once every sub-action has run (spec.md:158,
    /// the same acknowledge-then-report-later shape `ShellRegistry`'s smart mode uses
    /// for a long-running `shell` command).
    async fn execute_batch_async(self: Arc<Self>, p: &BTreeMap<String, Value>, ctx: Arc<dyn ActionContext>) -> Result<Value> {
        let actions_value = p.get("actions").ok_or_else(|| Error::MissingRequiredParam("actions".into()))?;
        let sub_actions = batch::parse_sub_actions(actions_value)?;
        let batch_id = ActionId::new();
        let sub_ids: Vec<ActionId> = sub_actions.iter().map(|_| ActionId::new()).collect();

        let router = self;
        let task_ctx = ctx;
        let task_batch_id = batch_id.clone();
        tokio::spawn(async move {
            let results = batch::run_async(&sub_actions, |a| Arc::clone(&router).dispatch_owned(a, task_ctx.clone())).await;
            let outcomes = results
                .into_iter()
                .map(|r| (sub_ids[r.index].clone(), r.outcome))
                .collect();
            if let Err(e) = task_ctx.post_batch_completed(task_batch_id, outcomes).await {
                tracing::warn!(error = %e, "failed to post batch_completed back to agent mailbox");
            }
        });

        Ok(batch_pending_value(&batch_id))
    }

    fn dispatch_owned(self: Arc<Self>, action: Action, ctx: Arc<dyn ActionContext>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Value>> + Send>> {
        Box::pin(async move { self.dispatch(&action, ctx).await })
    }
}

fn batch_pending_value(batch_id: &ActionId) -> Value {
    let mut m = BTreeMap::new();
    m.insert("status".to_string(), Value::Str("pending".into()));
    m.insert("batch_id".to_string(), Value::Str(batch_id.as_str().to_string()));
    Value::Map(m)
}

fn shell_dispatch_to_value(dispatch: shell::ShellDispatch) -> Value {
    match dispatch {
        shell::ShellDispatch::Pending => {
            let mut m = BTreeMap::new();
            m.insert("status".to_string(), Value::Str("pending".into()));
            Value::Map(m)
        }
        shell::ShellDispatch::Done(outcome) => {
            let mut m = BTreeMap::new();
            m.insert("status".to_string(), Value::Str("done".into()));
            m.insert(
                "exit_code".to_string(),
                outcome.exit_code.map(Value::Int).unwrap_or(Value::Null),
            );
            m.insert("stdout".to_string(), Value::Str(outcome.stdout));
            m.insert("stderr".to_string(), Value::Str(outcome.stderr));
            Value::Map(m)
        }
    }
}

fn batch_results_to_value(results: Vec<batch::BatchItemResult>) -> Value {
    Value::List(
        results
            .into_iter()
            .map(|r| {
                let mut m = BTreeMap::new();
                m.insert("index".to_string(), Value::Int(r.index as i64));
                match r.outcome {
                    Ok(v) => {
                        m.insert("ok".to_string(), Value::Bool(true));
                        m.insert("value".to_string(), v);
                    }
                    Err(e) => {
                        m.insert("ok".to_string(), Value::Bool(false));
                        m.insert("error".to_string(), Value::Str(e.to_string()));
                    }
                }
                Value::Map(m)
            })
            .collect(),
    )
}

fn str_param<'a>(p: &'a BTreeMap<String, Value>, name: &str) -> Result<&'a str> {
    p.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MissingRequiredParam(name.to_string()))
}

fn decimal_param(p: &BTreeMap<String, Value>, name: &str) -> Result<rust_decimal::Decimal> {
    match p.get(name) {
        Some(Value::Decimal(d)) => Ok(*d),
        Some(v) => v
            .as_f64()
            .and_then(|f| rust_decimal::Decimal::try_from(f).ok())
            .ok_or_else(|| Error::MissingRequiredParam(name.to_string())),
        None => Err(Error::MissingRequiredParam(name.to_string())),
    }
}

fn string_map_param(p: &BTreeMap<String, Value>, name: &str) -> BTreeMap<String, String> {
    match p.get(name) {
        Some(Value::Map(m)) => m
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn string_list_param(p: &BTreeMap<String, Value>, name: &str) -> Result<Vec<String>> {
    match p.get(name) {
        Some(Value::List(items)) => Ok(items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()),
        _ => Err(Error::MissingRequiredParam(name.to_string())),
    }
}

fn spawn_request(p: &BTreeMap<String, Value>) -> Result<SpawnChildRequest> {
    let task_description = str_param(p, "task_description")?.to_string();
    let profile_name = str_param(p, "profile_name")?.to_string();
    let budget = match p.get("budget") {
        Some(Value::Decimal(d)) => Some(*d),
        Some(v) => v.as_f64().and_then(|f| rust_decimal::Decimal::try_from(f).ok()),
        None => None,
    };
    let downstream_constraints = match p.get("downstream_constraints") {
        Some(Value::List(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    };
    Ok(SpawnChildRequest {
        task_description,
        profile_name,
        success_criteria: p.get("success_criteria").and_then(Value::as_str).map(str::to_string),
        immediate_context: p.get("immediate_context").and_then(Value::as_str).map(str::to_string),
        approach_guidance: p.get("approach_guidance").and_then(Value::as_str).map(str::to_string),
        role: p.get("role").and_then(Value::as_str).map(str::to_string),
        budget,
        downstream_constraints,
    })
}
