//! The Agent Actor (spec §4.1): a single-threaded, long-lived loop driving one
//! agent's consensus cycle from creation to termination. Owns its `Agent` state
//! exclusively — nothing outside this loop ever mutates it directly; everything
//! comes in as a mailbox message (spec §5 "only the actor mutates its own state").

use crate::collaborators::AgentStore;
use crate::context_impl::AgentContext;
use crate::mailbox::{ActionOutcome, AgentMessage, Mailbox, MailboxSender};
use crate::prompt::{messages_for_model, parse_candidate, system_prompt};
use conclave_actions::{ActionContext, ActionRouter};
use conclave_consensus::{merge_candidates, Candidate, CostAccumulator};
use conclave_core::model::{Agent, AgentStatus, HistoryEntry, HistoryEntryKind};
use conclave_core::{Action, ActionSchema, ActionType, Value};
use conclave_llm::{GenerateOpts, LlmMessage, LlmProvider};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MAX_MODEL_BACKOFF_ATTEMPTS: u32 = 3;
const BASE_BACKOFF_MS: u64 = 100;

pub struct AgentActor {
    agent: Agent,
    mailbox: Mailbox,
    self_sender: MailboxSender,
    provider: Arc<dyn LlmProvider>,
    action_registry: Arc<BTreeMap<ActionType, ActionSchema>>,
    router: Arc<ActionRouter>,
    context: Arc<AgentContext>,
    store: Arc<dyn AgentStore>,
    cost: CostAccumulator,
    model_failure_streak: u32,
}

/// True when the actor should go idle rather than immediately request another
/// cycle (an indefinite `wait{true}` or a terminal action).
fn is_terminal_wait(action: &Action) -> bool {
    matches!(action.action_type, ActionType::Wait)
        && matches!(action.params.get("duration"), Some(Value::Bool(true)))
}

impl AgentActor {
    /// `self_sender` must be the same handle `context` was built with — the Agent
    /// Actor and the `ActionContext` it hands to the Router share one mailbox, so
    /// `mailbox`/`self_sender` are built by the caller first via `Mailbox::channel()`
    /// and threaded into both.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent: Agent,
        mailbox: Mailbox,
        self_sender: MailboxSender,
        provider: Arc<dyn LlmProvider>,
        action_registry: Arc<BTreeMap<ActionType, ActionSchema>>,
        router: Arc<ActionRouter>,
        context: Arc<AgentContext>,
        store: Arc<dyn AgentStore>,
    ) -> Self {
        Self {
            agent,
            mailbox,
            self_sender,
            provider,
            action_registry,
            router,
            context,
            store,
            cost: CostAccumulator::default(),
            model_failure_streak: 0,
        }
    }

    /// Drives the actor until `stop_requested`. Spec §4.1's output contract, steps
    /// 1-9, runs inside `run_cycle`; this loop only owns message receipt and the
    /// drain rule.
    pub async fn run(mut self) {
        while let Some(message) = self.mailbox.recv().await {
            if message.is_stop() {
                self.handle_stop().await;
                return;
            }
            if message.is_trigger() {
                self.drain_and_cycle().await;
                continue;
            }
            let retrigger = self.apply_message(message);
            if retrigger {
                let _ = self.self_sender.send(AgentMessage::ContinueConsensus);
            }
        }
    }

    /// The drain rule (spec §4.1, P4): collapse every immediately-queued trigger
    /// into exactly one cycle. Non-trigger messages observed mid-drain are applied
    /// first, in order, so the cycle that follows sees up-to-date state.
    async fn drain_and_cycle(&mut self) {
        let drained = self.mailbox.try_drain_triggers();
        let mut saw_retrigger_worthy = false;
        for msg in drained.other {
            saw_retrigger_worthy |= self.apply_message(msg);
        }
        self.run_cycle().await;
        if drained.stopped {
            self.handle_stop().await;
            return;
        }
        if saw_retrigger_worthy {
            let _ = self.self_sender.send(AgentMessage::ContinueConsensus);
        }
    }

    async fn handle_stop(&mut self) {
        info!(agent_id = %self.agent.agent_id, "stop_requested: draining and terminating");
        let drained = self.mailbox.try_drain_triggers();
        for msg in drained.other {
            self.apply_message(msg);
        }
        self.agent.status = AgentStatus::Stopped;
        self.persist().await;
    }

    /// One consensus cycle: spec §4.1 steps 1-9.
    async fn run_cycle(&mut self) {
        if self.agent.model_pool.is_empty() {
            warn!(agent_id = %self.agent.agent_id, "no models configured, skipping cycle");
            return;
        }

        let system = system_prompt(&self.agent);
        let mut candidates = Vec::new();
        let mut failures = 0usize;

        for model in self.agent.model_pool.clone() {
            let mut messages = vec![LlmMessage::user(system.clone())];
            messages.extend(messages_for_model(&self.agent, &model));
            let opts = GenerateOpts {
                system: Some(system.clone()),
                ..Default::default()
            };
            match self.provider.generate_text(&model, &messages, opts, None).await {
                Ok(response) => match parse_candidate(&response.text) {
                    Ok(action) => candidates.push(Candidate { model, action }),
                    Err(e) => {
                        warn!(%model, error = %e, "model reply did not parse into a valid action");
                        failures += 1;
                    }
                },
                Err(e) => {
                    warn!(%model, error = %e, "model RPC failed for this cycle");
                    failures += 1;
                }
            }
        }

        if candidates.is_empty() {
            self.model_failure_streak = (self.model_failure_streak + 1).min(MAX_MODEL_BACKOFF_ATTEMPTS);
            let backoff = Duration::from_millis(BASE_BACKOFF_MS * self.model_failure_streak as u64);
            error!(agent_id = %self.agent.agent_id, failures, "no model survived this cycle, backing off {:?}", backoff);
            let sender = self.self_sender.clone();
            tokio::spawn(async move {
                tokio::time::sleep(backoff).await;
                let _ = sender.send(AgentMessage::ContinueConsensus);
            });
            return;
        }
        self.model_failure_streak = 0;

        let outcome = merge_candidates(&candidates, &self.action_registry, self.provider.as_ref(), &mut self.cost).await;

        let action = match outcome {
            Ok(action) => action,
            Err(e) => {
                warn!(agent_id = %self.agent.agent_id, error = %e, "consensus failed this cycle");
                self.append_history_all(HistoryEntryKind::Decision, format!("no-consensus recovery: {e}"));
                let _ = self.self_sender.send(AgentMessage::ContinueConsensus);
                return;
            }
        };

        self.append_history_all(HistoryEntryKind::Decision, describe_action(&action));

        let ctx: Arc<dyn ActionContext> = self.context.clone();
        let dispatch_result = Arc::clone(&self.router).dispatch(&action, ctx).await;

        match &dispatch_result {
            Ok(value) => {
                debug!(agent_id = %self.agent.agent_id, action = %action.action_type, "action completed");
                self.append_history_all(HistoryEntryKind::Agent, format!("{} -> {value:?}", action.action_type));
            }
            Err(e) => {
                warn!(agent_id = %self.agent.agent_id, action = %action.action_type, error = %e, "action failed");
                self.append_history_all(HistoryEntryKind::Agent, format!("{} failed: {e}", action.action_type));
            }
        }

        self.persist().await;

        if dispatch_result.is_ok() && is_terminal_wait(&action) {
            info!(agent_id = %self.agent.agent_id, "entering indefinite wait, cycle loop goes idle");
            return;
        }
        if let Ok(v) = &dispatch_result {
            if let Some(delay) = wait_delay(&action, v) {
                self.schedule_wait(delay);
                return;
            }
        }

        let _ = self.self_sender.send(AgentMessage::ContinueConsensus);
    }

    fn schedule_wait(&self, delay: Duration) {
        let sender = self.self_sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(AgentMessage::WaitExpired { timer_ref: 0 });
        });
    }

    fn append_history_all(&mut self, kind: HistoryEntryKind, content: String) {
        for model in self.agent.model_pool.clone() {
            self.agent
                .model_histories
                .entry(model)
                .or_default()
                .push(HistoryEntry::new(kind, content.clone()));
        }
    }

    /// Applies one non-trigger message to local state. Returns whether this
    /// mutation should itself request another cycle.
    fn apply_message(&mut self, message: AgentMessage) -> bool {
        match message {
            AgentMessage::UserMessage { content } => {
                self.append_history_all(HistoryEntryKind::User, content);
                true
            }
            AgentMessage::AgentMessage { from_id, content } => {
                self.append_history_all(HistoryEntryKind::User, format!("[from {from_id}] {content}"));
                true
            }
            AgentMessage::ActionResult { action_type, outcome, .. } => {
                let text = match outcome {
                    ActionOutcome::Success(v) => format!("{action_type} completed: {v:?}"),
                    ActionOutcome::Failure(e) => format!("{action_type} failed: {e}"),
                };
                self.append_history_all(HistoryEntryKind::Agent, text);
                true
            }
            AgentMessage::BatchActionResult { .. } => false,
            AgentMessage::BatchCompleted { results, .. } => {
                let text = format!("batch completed: {} sub-actions", results.len());
                self.append_history_all(HistoryEntryKind::Agent, text);
                true
            }
            AgentMessage::ChildSpawned { agent_id } => {
                self.agent.add_child_idempotent(agent_id);
                false
            }
            AgentMessage::ChildDismissed { agent_id } => {
                self.agent.remove_child(&agent_id);
                false
            }
            AgentMessage::UpdateTodos { items } => {
                self.agent.todos = items
                    .into_iter()
                    .filter_map(|m| {
                        let content = m.get("content").and_then(Value::as_str)?.to_string();
                        let state = match m.get("state").and_then(Value::as_str) {
                            Some("pending") => conclave_core::model::TodoState::Pending,
                            Some("done") => conclave_core::model::TodoState::Done,
                            _ => conclave_core::model::TodoState::Todo,
                        };
                        Some(conclave_core::model::TodoItem { content, state })
                    })
                    .collect();
                true
            }
            AgentMessage::RecordOrientation { summary } => {
                self.agent.prompt_fields.transformed.narrative = summary;
                false
            }
            AgentMessage::UpdateSkills { skills } => {
                for skill in skills {
                    if let Some(existing) = self.agent.active_skills.iter_mut().find(|s| s.name == skill.name) {
                        *existing = skill;
                    } else {
                        self.agent.active_skills.push(skill);
                    }
                }
                false
            }
            AgentMessage::UpdateBudgetData { new_data } => {
                self.agent.budget_data = new_data;
                false
            }
            AgentMessage::UpdateBudgetCommitted { delta } => {
                self.agent.budget_data.committed += delta;
                false
            }
            AgentMessage::ReleaseBudgetCommitted { amount } => {
                self.agent.budget_data.committed = (self.agent.budget_data.committed - amount).max(rust_decimal::Decimal::ZERO);
                false
            }
            AgentMessage::WaitExpired { .. } => true,
            AgentMessage::SpawnFailed { child_id, reason } => {
                self.append_history_all(HistoryEntryKind::Agent, format!("spawn_failed for {child_id}: {reason}"));
                false
            }
            AgentMessage::GetState { reply } => {
                let _ = reply.send(self.agent.clone());
                false
            }
            AgentMessage::TriggerConsensus | AgentMessage::ContinueConsensus | AgentMessage::StopRequested => false,
        }
    }

    async fn persist(&self) {
        if let Err(e) = self.store.upsert(&self.agent).await {
            warn!(agent_id = %self.agent.agent_id, error = %e, "best-effort state write-through failed");
        }
    }
}

/// A literal human-readable summary of a chosen action for the `decision` history
/// entry (spec §4.1 step 5). Not parsed back — this is narrative, not data.
fn describe_action(action: &Action) -> String {
    format!("decided: {} {:?}", action.action_type, action.params)
}

fn wait_delay(action: &Action, _result: &Value) -> Option<Duration> {
    if action.action_type != ActionType::Wait {
        return None;
    }
    match action.params.get("duration") {
        Some(Value::Int(secs)) if *secs > 0 => Some(Duration::from_secs(*secs as u64)),
        Some(Value::Float(secs)) if *secs > 0.0 => Some(Duration::from_secs_f64(*secs)),
        Some(Value::Decimal(d)) if *d > rust_decimal::Decimal::ZERO => {
            d.to_string().parse::<f64>().ok().map(Duration::from_secs_f64)
        }
        _ => None,
    }
}
