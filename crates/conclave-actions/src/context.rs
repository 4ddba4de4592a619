//! The Router's back-channel into the Agent Actor, Tree Lifecycle Controller, and
//! Budget Escrow. Decouples this crate from `conclave-agent`/`conclave-tree`, the same
//! way `SpawnableRuntime`/`SubagentControl` decoupled the tool layer from the runtime.

use async_trait::async_trait;
use conclave_core::{ActionId, AgentId, Result, Value};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::Path;

/// Parameters needed to spawn a child, already reduced by the Consensus Engine.
#[derive(Clone, Debug)]
pub struct SpawnChildRequest {
    pub task_description: String,
    pub profile_name: String,
    pub success_criteria: Option<String>,
    pub immediate_context: Option<String>,
    pub approach_guidance: Option<String>,
    pub role: Option<String>,
    pub budget: Option<Decimal>,
    pub downstream_constraints: Vec<String>,
}

/// What the Action Router needs from the owning agent to execute non-pure actions
/// (spawn/dismiss a child, move budget, talk to another agent, touch secrets, publish
/// events). One `ActionContext` is handed to a short-lived `ActionRouter` per dispatch.
#[async_trait]
pub trait ActionContext: Send + Sync {
    fn agent_id(&self) -> &AgentId;
    fn workspace_root(&self) -> &Path;

    async fn spawn_child(&self, req: SpawnChildRequest) -> Result<AgentId>;
    async fn dismiss_child(&self, child_id: &AgentId, reason: Option<String>) -> Result<()>;
    async fn adjust_child_budget(&self, child_id: &AgentId, new_allocation: Decimal) -> Result<()>;
    async fn record_cost(&self, amount: Decimal, reason: Option<String>) -> Result<()>;
    async fn send_message(&self, to_agent_id: &AgentId, content: String) -> Result<()>;

    async fn resolve_secret(&self, name: &str) -> Result<String>;
    async fn generate_secret(&self, name: &str, length: usize) -> Result<()>;
    async fn search_secrets(&self, query: &str) -> Result<Vec<String>>;

    async fn set_todos(&self, items: Vec<BTreeMap<String, Value>>) -> Result<()>;
    async fn record_orientation(&self, summary: String) -> Result<()>;
    async fn publish_event(&self, topic: &str, payload: Value) -> Result<()>;

    async fn ask_answer_engine(&self, question: &str) -> Result<String>;
    async fn learn_skills(&self, skill_names: Vec<String>) -> Result<()>;
    async fn create_skill(&self, name: &str, content: &str, permanent: bool) -> Result<()>;

    /// Delivers a `batch_async` batch's final outcome back onto the owning agent's
    /// own mailbox once every sub-action has completed in the background (spec.md:
    /// the Router acknowledges a `batch_async` dispatch immediately and posts this
    /// later, asynchronously, rather than blocking the calling cycle on it).
    async fn post_batch_completed(&self, batch_id: ActionId, results: Vec<(ActionId, Result<Value>)>) -> Result<()>;
}
