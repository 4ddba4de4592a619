//! Narrow interfaces to everything spec §1 names as an out-of-scope collaborator:
//! the Tree Lifecycle Controller, the Registry/directory, the persistent store, the
//! pub/sub event bus, the credential store, the answer engine, and the skill
//! catalog. The Agent Actor depends only on these traits, never on concrete
//! implementations — `conclave-tree` and `conclave-gateway` wire the real ones in.

use async_trait::async_trait;
use conclave_actions::SpawnChildRequest;
use conclave_core::model::{Agent, Skill};
use conclave_core::{AgentId, Result, Value};
use rust_decimal::Decimal;

/// The Tree Lifecycle Controller's surface as seen by an Agent Actor (spec §4.6).
#[async_trait]
pub trait TreeHandle: Send + Sync {
    async fn spawn_child(&self, parent: &AgentId, req: SpawnChildRequest) -> Result<AgentId>;
    async fn dismiss_child(&self, parent: &AgentId, child: &AgentId, reason: Option<String>) -> Result<()>;
    async fn adjust_child_budget(&self, parent: &AgentId, child: &AgentId, new_allocation: Decimal) -> Result<()>;
}

/// Process lookup by `agent_id` (glossary: Registry), narrowed to the one operation
/// the Agent Actor needs directly: handing another agent a message.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn send_message(&self, from: &AgentId, to: &AgentId, content: String) -> Result<()>;
}

/// Credential storage (spec §1: out of scope, narrow interface only).
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<String>;
    async fn generate(&self, name: &str, length: usize) -> Result<()>;
    async fn search(&self, query: &str) -> Result<Vec<String>>;
}

/// The configured answer engine (spec §1: out of scope, narrow interface only).
#[async_trait]
pub trait AnswerEngineClient: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String>;
}

/// Resolves `learn_skills`' bare names to full skill records.
#[async_trait]
pub trait SkillCatalog: Send + Sync {
    async fn resolve(&self, names: &[String]) -> Result<Vec<Skill>>;
}

/// Append-only cost records and the `spent` figure the Budget Escrow reads
/// (spec §4.5, §6 persistent-store contract).
#[async_trait]
pub trait CostLedger: Send + Sync {
    async fn record(&self, agent_id: &AgentId, amount: Decimal, reason: Option<String>) -> Result<()>;
    async fn spent(&self, agent_id: &AgentId) -> Result<Decimal>;
}

/// Topic-based fan-out to UI and persistence subscribers (spec §6 pub/sub topics).
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Value) -> Result<()>;
}

/// Best-effort write-through of the full Agent record (spec §4.1 "State
/// persistence"): on DB error the actor logs and continues.
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn upsert(&self, agent: &Agent) -> Result<()>;
}
