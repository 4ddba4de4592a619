//! Tree Lifecycle Controller (spec §4.6): spawn, dismiss, pause, and restore, with
//! the ordering and orphan-cleanup guarantees spec §4.6/§8 name. Grounded on the
//! donor's `agenticlaw-tools/tools/subagent.rs` spawn-request shape and
//! `agenticlaw-agent/queue.rs`'s cancellation-on-dismissal pattern, generalized from
//! one coding-agent process to the full parent/child agent tree.

use crate::events::EventBus;
use crate::registry::{Registry, RegistryEntry};
use crate::store::PersistedAgentLoader;
use async_trait::async_trait;
use conclave_agent::budget;
use conclave_agent::collaborators::CostLedger;
use conclave_agent::mailbox::AgentMessage;
use conclave_agent::{AgentActor, MailboxSender};
use conclave_core::model::{Agent, AgentStatus, Profile, TaskStatus};
use conclave_core::{AgentId, Error, Result, TaskId};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Resolves a profile name to its definition (spec §3 glossary: Profile). A thin
/// collaborator, same shape as `conclave_agent`'s narrow traits.
#[async_trait]
pub trait ProfileCatalog: Send + Sync {
    async fn resolve(&self, profile_name: &str) -> Result<Profile>;
}

/// Builds a not-yet-running `AgentActor` plus the `MailboxSender` that reaches it,
/// for a given `Agent` record. Supplied by the binary that owns the concrete
/// `LlmProvider`/`ActionRouter`/collaborator wiring (spec's "Supervisor") — the
/// Tree Lifecycle Controller only needs to be able to start one, never how. The
/// sender comes back separately because the caller (this controller) must register
/// it before the actor's first `TriggerConsensus`.
pub type ActorFactory = Arc<dyn Fn(Agent) -> (AgentActor, MailboxSender) + Send + Sync>;

/// Distinguishes "no parent, by design" from "parent_id set but unresolvable"
/// (SPEC_FULL §13 Open Question 1). Only `Missing` is ever escalated as an error.
#[derive(Debug, PartialEq, Eq)]
pub enum ParentLookup {
    Root,
    Found(AgentId),
    Missing(AgentId),
}

/// The Arc-held state a background spawn/dismiss worker needs — cloned field by
/// field rather than cloning `TreeController` itself, so its public methods take
/// plain `&self` (required to implement the foreign `TreeHandle` trait on this
/// local type; a `self: Arc<Self>` receiver would force callers through a local
/// newtype for no benefit here).
#[derive(Clone)]
struct Shared {
    registry: Arc<Registry>,
    store: Arc<dyn PersistedAgentLoader>,
    events: Arc<EventBus>,
    profiles: Arc<dyn ProfileCatalog>,
    cost_ledger: Arc<dyn CostLedger>,
    actor_factory: ActorFactory,
    dismissing: Arc<DashMap<AgentId, bool>>,
}

pub struct TreeController {
    shared: Shared,
    pause_grace_window: Duration,
}

impl TreeController {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn PersistedAgentLoader>,
        events: Arc<EventBus>,
        profiles: Arc<dyn ProfileCatalog>,
        cost_ledger: Arc<dyn CostLedger>,
        actor_factory: ActorFactory,
    ) -> Self {
        Self {
            shared: Shared {
                registry,
                store,
                events,
                profiles,
                cost_ledger,
                actor_factory,
                dismissing: Arc::new(DashMap::new()),
            },
            pause_grace_window: Duration::from_millis(500),
        }
    }

    fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    fn store(&self) -> &dyn PersistedAgentLoader {
        self.shared.store.as_ref()
    }

    fn lookup_parent(&self, parent_id: Option<&AgentId>) -> ParentLookup {
        match parent_id {
            None => ParentLookup::Root,
            Some(id) if self.registry().contains(id) => ParentLookup::Found(id.clone()),
            Some(id) => ParentLookup::Missing(id.clone()),
        }
    }

    async fn agent_state(&self, agent_id: &AgentId) -> Result<Agent> {
        let entry = self.registry().snapshot(agent_id).ok_or_else(|| Error::RegistryGone(agent_id.to_string()))?;
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        entry
            .sender
            .send(AgentMessage::GetState { reply: reply_tx })
            .map_err(|_| Error::RegistryGone(agent_id.to_string()))?;
        reply_rx.await.map_err(|_| Error::RegistryGone(agent_id.to_string()))
    }

    /// Spawns a child under `parent` (spec §4.6 "Spawn"). Returns the pre-generated
    /// `child_id` immediately; the rest of the work runs in a background task.
    pub async fn spawn_child(&self, parent: &AgentId, req: conclave_actions::SpawnChildRequest) -> Result<AgentId> {
        if self.shared.dismissing.get(parent).map(|b| *b).unwrap_or(false) {
            return Err(Error::ParentDismissing);
        }
        if let ParentLookup::Missing(id) = self.lookup_parent(Some(parent)) {
            return Err(Error::RegistryGone(id.to_string()));
        }

        let parent_agent = self.agent_state(parent).await?;
        let parent_spent = self.shared.cost_ledger.spent(parent).await.unwrap_or(Decimal::ZERO);

        let child_budget = match req.budget {
            Some(amount) => {
                budget::validate_allocation(&parent_agent.budget_data, parent_spent, amount)?;
                conclave_core::model::BudgetData::allocated(amount)
            }
            None => {
                if !matches!(parent_agent.budget_data.mode, conclave_core::model::BudgetMode::Na) {
                    return Err(Error::BudgetRequired);
                }
                conclave_core::model::BudgetData::unlimited()
            }
        };

        let child_id = AgentId::new();
        let shared = self.shared.clone();
        let parent = parent.clone();
        let profile_name = req.profile_name.clone();
        let worker_child_id = child_id.clone();

        tokio::spawn(async move {
            if let Err(e) = spawn_child_worker(&shared, &parent, &parent_agent, worker_child_id.clone(), profile_name, req, child_budget).await {
                warn!(child_id = %worker_child_id, error = %e, "spawn_child background worker failed");
                if let Some(parent_entry) = shared.registry.snapshot(&parent) {
                    let _ = parent_entry.sender.send(AgentMessage::SpawnFailed { child_id: worker_child_id, reason: e.to_string() });
                }
            }
        });

        Ok(child_id)
    }

    /// Dismisses `child` on behalf of `parent` (spec §4.6 "Dismiss"): authorization,
    /// then post-order subtree termination, leaves first.
    pub async fn dismiss_child(&self, parent: &AgentId, child: &AgentId, reason: Option<String>) -> Result<()> {
        let Some(snapshot) = self.registry().snapshot(child) else {
            return Ok(()); // idempotent: dismissing a non-existent child succeeds
        };
        if snapshot.parent_id.as_ref() != Some(parent) {
            return Err(Error::NotParent);
        }

        self.shared.dismissing.insert(parent.clone(), true);
        let shared = self.shared.clone();
        let parent = parent.clone();
        let child = child.clone();
        tokio::spawn(async move {
            terminate_subtree(&shared, &child).await;
            shared.dismissing.remove(&parent);
            if let Some(parent_entry) = shared.registry.snapshot(&parent) {
                let _ = parent_entry.sender.send(AgentMessage::ChildDismissed { agent_id: child.clone() });
            }
            let _ = reason;
        });
        Ok(())
    }

    pub async fn adjust_child_budget(&self, parent: &AgentId, child: &AgentId, new_allocation: Decimal) -> Result<()> {
        let snapshot = self.registry().snapshot(child).ok_or_else(|| Error::RegistryGone(child.to_string()))?;
        if snapshot.parent_id.as_ref() != Some(parent) {
            return Err(Error::NotParent);
        }
        let child_agent = self.agent_state(child).await?;
        let child_spent = self.shared.cost_ledger.spent(child).await.unwrap_or(Decimal::ZERO);
        let parent_agent = self.agent_state(parent).await?;
        let parent_spent = self.shared.cost_ledger.spent(parent).await.unwrap_or(Decimal::ZERO);

        let current_child = child_agent.budget_data.allocated.unwrap_or(Decimal::ZERO);
        if new_allocation < current_child {
            budget::validate_child_decrease(new_allocation, child_spent, child_agent.budget_data.committed)?;
        }
        let new_parent_budget = budget::adjust_child_allocation(&parent_agent.budget_data, current_child, new_allocation, parent_spent)?;

        snapshot.sender.send(AgentMessage::UpdateBudgetData {
            new_data: conclave_core::model::BudgetData { allocated: Some(new_allocation), ..child_agent.budget_data },
        }).map_err(|_| Error::RegistryGone(child.to_string()))?;

        if let Some(parent_entry) = self.registry().snapshot(parent) {
            parent_entry
                .sender
                .send(AgentMessage::UpdateBudgetCommitted { delta: new_parent_budget.committed - parent_agent.budget_data.committed })
                .map_err(|_| Error::RegistryGone(parent.to_string()))?;
        }
        Ok(())
    }

    /// Spawns the root Agent for a freshly-persisted Task (spec §2's "Data flow":
    /// `TaskManager.create` → persist Task → spawn root Agent Actor via Supervisor,
    /// registering in Registry). Unlike `spawn_child`, there is no parent to
    /// authorize against or commit budget from; the root always gets an unlimited
    /// `budget_data` (spec §3's `BudgetMode::Na`).
    pub async fn boot_root(&self, task_id: &TaskId, profile_name: &str, task_description: String) -> Result<AgentId> {
        let profile = self.shared.profiles.resolve(profile_name).await?;
        let mut agent = Agent::new(task_id.clone(), None, &profile);
        agent.prompt_fields.provided.task_description = task_description;
        agent.status = AgentStatus::Starting;

        let (actor, sender) = (self.shared.actor_factory)(agent.clone());
        let handle = tokio::spawn(actor.run());

        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        sender
            .send(AgentMessage::GetState { reply: reply_tx })
            .map_err(|_| Error::Internal("root mailbox closed immediately after spawn".into()))?;
        reply_rx.await.map_err(|_| Error::Internal("root actor did not confirm boot".into()))?;

        self.shared.registry.insert(
            agent.agent_id.clone(),
            RegistryEntry { task_id: agent.task_id.clone(), parent_id: None, sender: sender.clone(), handle },
        );
        let _ = sender.send(AgentMessage::TriggerConsensus);
        self.shared.events.publish(&format!("agents:{}:spawned", agent.agent_id), conclave_core::Value::Str(agent.agent_id.to_string()));

        Ok(agent.agent_id)
    }

    /// Graceful drain (spec §4.6 "Pause"). Returns once `stop_requested` has been
    /// sent to every currently-live agent; the Task only reaches `paused` once the
    /// last agent actually terminates (observed by the caller polling the Registry).
    pub async fn pause_task(&self, task_id: &TaskId) -> Result<()> {
        let s0 = self.registry().live_agents_for_task(task_id);
        self.store().save_task_status(task_id, if s0.is_empty() { TaskStatus::Paused } else { TaskStatus::Pausing }).await?;

        let mut already_stopped = std::collections::HashSet::new();
        for agent_id in &s0 {
            if let Some(entry) = self.registry().snapshot(agent_id) {
                let _ = entry.sender.send(AgentMessage::StopRequested);
                already_stopped.insert(agent_id.clone());
            }
        }

        tokio::time::sleep(self.pause_grace_window).await;

        // Sweep: catch agents that registered between enumeration and the first send.
        for agent_id in self.registry().live_agents_for_task(task_id) {
            if !already_stopped.contains(&agent_id) {
                if let Some(entry) = self.registry().snapshot(&agent_id) {
                    let _ = entry.sender.send(AgentMessage::StopRequested);
                }
            }
        }
        Ok(())
    }

    /// Restores every persisted Agent for a Task (spec §4.6 "Restore"), parents
    /// before children, tolerating individual failures.
    pub async fn restore_task(&self, task_id: &TaskId) -> Result<AgentId> {
        let agents = self.store().load_task_agents(task_id).await?;
        let mut restored: std::collections::HashMap<AgentId, AgentId> = std::collections::HashMap::new();
        let mut successful = 0usize;
        let mut failed = 0usize;
        let mut skipped = 0usize;
        let mut root: Option<AgentId> = None;
        let mut failed_parents: std::collections::HashSet<AgentId> = std::collections::HashSet::new();

        for persisted in agents {
            if let Some(parent_id) = &persisted.parent_id {
                if failed_parents.contains(parent_id) {
                    skipped += 1;
                    continue;
                }
            }

            if self.registry().contains(&persisted.agent_id) {
                info!(agent_id = %persisted.agent_id, "orphan occupies this agent_id, terminating and retrying once");
                terminate_subtree(&self.shared, &persisted.agent_id).await;
            }

            match restore_one(&self.shared, &persisted).await {
                Ok(()) => {
                    successful += 1;
                    restored.insert(persisted.agent_id.clone(), persisted.agent_id.clone());
                    if persisted.parent_id.is_none() {
                        root = Some(persisted.agent_id.clone());
                    }
                }
                Err(e) => {
                    error!(agent_id = %persisted.agent_id, error = %e, "failed to restore agent");
                    failed += 1;
                    failed_parents.insert(persisted.agent_id.clone());
                }
            }
        }

        if successful == 0 {
            return Err(Error::AllAgentsFailed);
        }
        if failed > 0 {
            warn!(task_id = %task_id, failed, skipped, "Partial restore: {failed} agents failed");
        }

        // Orphan cleanup: anything else the Registry has for this task that wasn't
        // just restored must go (spec §4.6 step 5, P9).
        for agent_id in self.registry().live_agents_for_task(task_id) {
            if !restored.contains_key(&agent_id) {
                terminate_subtree(&self.shared, &agent_id).await;
                let _ = self.store().mark_stopped(&agent_id).await;
            }
        }

        self.store().save_task_status(task_id, TaskStatus::Running).await?;
        root.ok_or(Error::AllAgentsFailed)
    }

    /// Boot revival (spec §4.6): attempt to restore every Task left `running` at the
    /// last shutdown. Always returns — per-task failures are logged and isolated.
    pub async fn boot_revival(&self) {
        let tasks = match self.store().running_tasks().await {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "boot revival could not enumerate running tasks");
                return;
            }
        };
        for task_id in tasks {
            if let Err(e) = self.restore_task(&task_id).await {
                error!(task_id = %task_id, error = %e, "boot revival failed for this task, isolated");
            }
        }
    }
}

#[async_trait]
impl conclave_agent::TreeHandle for TreeController {
    async fn spawn_child(&self, parent: &AgentId, req: conclave_actions::SpawnChildRequest) -> Result<AgentId> {
        TreeController::spawn_child(self, parent, req).await
    }
    async fn dismiss_child(&self, parent: &AgentId, child: &AgentId, reason: Option<String>) -> Result<()> {
        TreeController::dismiss_child(self, parent, child, reason).await
    }
    async fn adjust_child_budget(&self, parent: &AgentId, child: &AgentId, new_allocation: Decimal) -> Result<()> {
        TreeController::adjust_child_budget(self, parent, child, new_allocation).await
    }
}

#[allow(clippy::too_many_arguments)]
async fn spawn_child_worker(
    shared: &Shared,
    parent: &AgentId,
    parent_agent: &Agent,
    child_id: AgentId,
    profile_name: String,
    req: conclave_actions::SpawnChildRequest,
    child_budget: conclave_core::model::BudgetData,
) -> Result<()> {
    let profile = shared.profiles.resolve(&profile_name).await?;

    let mut agent = Agent::new(parent_agent.task_id.clone(), Some(parent.clone()), &profile);
    agent.agent_id = child_id.clone();
    agent.budget_data = child_budget;
    agent.prompt_fields.provided.task_description = req.task_description;
    agent.prompt_fields.provided.success_criteria = req.success_criteria;
    agent.prompt_fields.provided.immediate_context = req.immediate_context;
    agent.prompt_fields.provided.approach_guidance = req.approach_guidance;
    agent.prompt_fields.injected.global_constraints = req.downstream_constraints;
    agent.status = AgentStatus::Starting;

    let (actor, sender) = (shared.actor_factory)(agent.clone());
    let handle = tokio::spawn(actor.run());

    // Initial sync: confirm the actor booted before treating the spawn as live.
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    sender
        .send(AgentMessage::GetState { reply: reply_tx })
        .map_err(|_| Error::Internal("child mailbox closed immediately after spawn".into()))?;
    reply_rx.await.map_err(|_| Error::Internal("child actor did not confirm boot".into()))?;

    shared.registry.insert(
        child_id.clone(),
        RegistryEntry { task_id: agent.task_id.clone(), parent_id: Some(parent.clone()), sender: sender.clone(), handle },
    );

    let _ = sender.send(AgentMessage::TriggerConsensus);
    shared.events.publish(&format!("agents:{child_id}:spawned"), conclave_core::Value::Str(child_id.to_string()));

    if let Some(parent_entry) = shared.registry.snapshot(parent) {
        let _ = parent_entry.sender.send(AgentMessage::ChildSpawned { agent_id: child_id.clone() });
        if let Some(amount) = req.budget {
            let _ = parent_entry.sender.send(AgentMessage::UpdateBudgetCommitted { delta: amount });
        }
    }

    Ok(())
}

/// Depth-first subtree termination, leaves before the node itself (spec §4.6
/// dismiss: "terminates leaves first").
fn terminate_subtree<'a>(shared: &'a Shared, agent_id: &'a AgentId) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        for child in shared.registry.direct_children_of(agent_id) {
            terminate_subtree(shared, &child).await;
        }
        if let Some(entry) = shared.registry.remove(agent_id) {
            let _ = entry.sender.send(AgentMessage::StopRequested);
            let _ = entry.handle.await;
            let _ = shared.store.mark_stopped(agent_id).await;
        }
    })
}

async fn restore_one(shared: &Shared, persisted: &Agent) -> Result<()> {
    let (actor, sender) = (shared.actor_factory)(persisted.clone());
    let handle = tokio::spawn(actor.run());
    shared.registry.insert(
        persisted.agent_id.clone(),
        RegistryEntry { task_id: persisted.task_id.clone(), parent_id: persisted.parent_id.clone(), sender: sender.clone(), handle },
    );
    let _ = sender.send(AgentMessage::TriggerConsensus);
    Ok(())
}
