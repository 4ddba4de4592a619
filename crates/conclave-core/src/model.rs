//! Task/Agent data model (spec §3).

use crate::ids::{AgentId, TaskId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Pausing,
    Paused,
    Completed,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub prompt: String,
    pub status: TaskStatus,
    pub global_context: Option<String>,
    #[serde(default)]
    pub initial_constraints: Vec<String>,
    pub profile_name: String,
    pub result: Option<String>,
    pub error_message: Option<String>,
}

impl Task {
    pub fn new(prompt: impl Into<String>, profile_name: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            prompt: prompt.into(),
            status: TaskStatus::Running,
            global_context: None,
            initial_constraints: Vec::new(),
            profile_name: profile_name.into(),
            result: None,
            error_message: None,
        }
    }

    /// Sets `error_message` and moves the task to `failed`, per spec §7's
    /// "user-visible failures" rule: the Task record is already committed, so it is
    /// marked failed rather than left dangling with orphan Agents.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.status = TaskStatus::Failed;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Starting,
    Running,
    Idle,
    Pausing,
    Paused,
    Stopped,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMode {
    /// No cap.
    Na,
    Root,
    Allocated,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BudgetData {
    pub mode: BudgetMode,
    pub allocated: Option<Decimal>,
    pub committed: Decimal,
}

impl BudgetData {
    pub fn unlimited() -> Self {
        Self {
            mode: BudgetMode::Na,
            allocated: None,
            committed: Decimal::ZERO,
        }
    }

    pub fn allocated(amount: Decimal) -> Self {
        Self {
            mode: BudgetMode::Allocated,
            allocated: Some(amount),
            committed: Decimal::ZERO,
        }
    }
}

/// Three-zone prompt record (spec §3).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PromptFields {
    pub injected: InjectedFields,
    pub provided: ProvidedFields,
    pub transformed: TransformedFields,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InjectedFields {
    pub global_context: Option<String>,
    pub global_constraints: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProvidedFields {
    pub task_description: String,
    pub success_criteria: Option<String>,
    pub immediate_context: Option<String>,
    pub approach_guidance: Option<String>,
    pub role: Option<String>,
    pub cognitive_style: Option<String>,
    pub output_style: Option<String>,
    pub delegation_strategy: Option<String>,
    pub downstream_constraints: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransformedFields {
    pub narrative: String,
    pub sibling_summaries: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEntryKind {
    User,
    Agent,
    Decision,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: HistoryEntryKind,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HistoryEntry {
    pub fn new(kind: HistoryEntryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// One sequence per model, since different models see different condensed
/// histories after summarization.
pub type ModelHistories = BTreeMap<String, Vec<HistoryEntry>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoState {
    Todo,
    Pending,
    Done,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    pub state: TodoState,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub path: Option<String>,
    pub content: Option<String>,
    pub permanent: bool,
}

/// `{name, model_pool, capability_groups, default prompt fragments}` selected at
/// Task creation (glossary: Profile).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub model_pool: Vec<String>,
    pub capability_groups: Vec<String>,
    pub default_prompt_fragments: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: AgentId,
    pub task_id: TaskId,
    pub parent_id: Option<AgentId>,
    pub profile_name: String,
    pub model_pool: Vec<String>,
    pub capability_groups: Vec<String>,
    pub prompt_fields: PromptFields,
    pub model_histories: ModelHistories,
    pub budget_data: BudgetData,
    pub active_skills: Vec<Skill>,
    pub todos: Vec<TodoItem>,
    /// Direct children, insertion-ordered (spec §3: `children`).
    pub children: Vec<AgentId>,
    /// Suppresses further spawns while a dismiss-subtree worker is in flight.
    pub dismissing: bool,
    pub status: AgentStatus,
}

impl Agent {
    pub fn new(task_id: TaskId, parent_id: Option<AgentId>, profile: &Profile) -> Self {
        Self {
            agent_id: AgentId::new(),
            task_id,
            parent_id,
            profile_name: profile.name.clone(),
            model_pool: profile.model_pool.clone(),
            capability_groups: profile.capability_groups.clone(),
            prompt_fields: PromptFields::default(),
            model_histories: ModelHistories::new(),
            budget_data: BudgetData::unlimited(),
            active_skills: Vec::new(),
            todos: Vec::new(),
            children: Vec::new(),
            dismissing: false,
            status: AgentStatus::Starting,
        }
    }

    /// Idempotent child tracking (spec §5, P8): delivering the same id twice must
    /// not duplicate it in `children`.
    pub fn add_child_idempotent(&mut self, child_id: AgentId) {
        if !self.children.contains(&child_id) {
            self.children.push(child_id);
        }
    }

    pub fn remove_child(&mut self, child_id: &AgentId) {
        self.children.retain(|c| c != child_id);
    }
}
