//! The persistent store as the Tree Lifecycle Controller needs it (spec §6
//! "Persistent store contract"): load every Agent for a Task in insertion order
//! (parents first) for restore, and flip a Task's status. The relational schema
//! itself is explicitly out of scope (spec §1) — this crate only needs the narrow
//! slice `restore_task`/`pause_task`/boot revival touch.

use async_trait::async_trait;
use conclave_core::model::{Agent, Task, TaskStatus};
use conclave_core::{AgentId, Result, TaskId};

#[async_trait]
pub trait PersistedAgentLoader: Send + Sync {
    /// Parents before children, per spec §4.6 restore step 1.
    async fn load_task_agents(&self, task_id: &TaskId) -> Result<Vec<Agent>>;
    async fn load_task(&self, task_id: &TaskId) -> Result<Task>;
    async fn save_task_status(&self, task_id: &TaskId, status: TaskStatus) -> Result<()>;
    async fn mark_stopped(&self, agent_id: &AgentId) -> Result<()>;
    /// Every Task in `running` status with persisted agents (spec §4.6 "Boot revival").
    async fn running_tasks(&self) -> Result<Vec<TaskId>>;
}

/// A process-memory implementation sufficient for tests and a single-node deployment
/// without a real relational store wired in yet (spec §1: the DB is a named
/// collaborator, not specified here beyond the fields it carries).
pub struct InMemoryStore {
    agents: dashmap::DashMap<TaskId, Vec<Agent>>,
    tasks: dashmap::DashMap<TaskId, Task>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self { agents: dashmap::DashMap::new(), tasks: dashmap::DashMap::new() }
    }

    pub fn put_task(&self, task: Task) {
        self.tasks.insert(task.id.clone(), task);
    }

    /// Appends in insertion order — callers are responsible for inserting parents
    /// before children, matching how a real upsert-on-spawn sequence would persist.
    pub fn put_agent(&self, agent: Agent) {
        self.agents.entry(agent.task_id.clone()).or_default().push(agent);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistedAgentLoader for InMemoryStore {
    async fn load_task_agents(&self, task_id: &TaskId) -> Result<Vec<Agent>> {
        Ok(self.agents.get(task_id).map(|v| v.clone()).unwrap_or_default())
    }

    async fn load_task(&self, task_id: &TaskId) -> Result<Task> {
        self.tasks
            .get(task_id)
            .map(|t| t.clone())
            .ok_or_else(|| conclave_core::Error::Internal(format!("no such task {task_id}")))
    }

    async fn save_task_status(&self, task_id: &TaskId, status: TaskStatus) -> Result<()> {
        if let Some(mut t) = self.tasks.get_mut(task_id) {
            t.status = status;
        }
        Ok(())
    }

    async fn mark_stopped(&self, agent_id: &AgentId) -> Result<()> {
        for mut entry in self.agents.iter_mut() {
            if let Some(a) = entry.value_mut().iter_mut().find(|a| a.agent_id == *agent_id) {
                a.status = conclave_core::model::AgentStatus::Stopped;
            }
        }
        Ok(())
    }

    async fn running_tasks(&self) -> Result<Vec<TaskId>> {
        Ok(self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Running)
            .map(|t| t.key().clone())
            .collect())
    }
}

#[async_trait]
impl conclave_agent::AgentStore for InMemoryStore {
    async fn upsert(&self, agent: &Agent) -> Result<()> {
        let mut bucket = self.agents.entry(agent.task_id.clone()).or_default();
        if let Some(existing) = bucket.iter_mut().find(|a| a.agent_id == agent.agent_id) {
            *existing = agent.clone();
        } else {
            bucket.push(agent.clone());
        }
        Ok(())
    }
}
