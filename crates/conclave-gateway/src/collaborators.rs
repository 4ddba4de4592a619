//! Concrete implementations of the narrow collaborator traits `conclave-agent` and
//! `conclave-tree` depend on (spec §1: these systems are explicitly out of scope for
//! the core, named only by their interfaces). The Supervisor binary is the one place
//! that gets to know what a secret store, answer engine, or skill catalog actually
//! is — grounded on the donor's own simple environment-backed adapters in
//! `agenticlaw-tools/tools/secrets.rs`.

use async_trait::async_trait;
use conclave_agent::collaborators::{AgentDirectory, AnswerEngineClient, CostLedger, SecretStore, SkillCatalog};
use conclave_core::model::Skill;
use conclave_core::{AgentId, Error, Result};
use conclave_llm::{GenerateOpts, LlmMessage, LlmProvider};
use conclave_tree::Registry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Resolves secrets from the process environment, following the donor's own
/// `env`-backed credential resolver — a real vault is named only as a future swap-in,
/// per spec §1.
pub struct EnvSecretStore {
    prefix: String,
}

impl EnvSecretStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    fn env_key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name.to_uppercase())
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn resolve(&self, name: &str) -> Result<String> {
        std::env::var(self.env_key(name)).map_err(|_| Error::Internal(format!("secret {name} not set")))
    }

    /// Generation has nowhere durable to write in an env-backed store; the caller
    /// gets a fresh random value back via a subsequent `search`, matching how the
    /// donor's own "generate then look up" secrets tool behaves against a flat store.
    async fn generate(&self, name: &str, length: usize) -> Result<()> {
        let mut value = String::new();
        while value.len() < length {
            value.push_str(&uuid::Uuid::new_v4().simple().to_string());
        }
        value.truncate(length);
        std::env::set_var(self.env_key(name), value);
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let query = query.to_uppercase();
        Ok(std::env::vars()
            .filter_map(|(k, _)| k.strip_prefix(&self.prefix).map(str::to_string))
            .filter(|k| k.contains(&query))
            .collect())
    }
}

/// The `answer_engine` action's collaborator, backed by the same `LlmProvider` the
/// Agent Actor itself uses — a single free-text model call outside the consensus
/// loop, per spec §4.3's `answer_engine` action description.
pub struct LlmAnswerEngine {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmAnswerEngine {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self { provider, model: model.into() }
    }
}

#[async_trait]
impl AnswerEngineClient for LlmAnswerEngine {
    async fn ask(&self, question: &str) -> Result<String> {
        let messages = vec![LlmMessage::user(question)];
        let response = self
            .provider
            .generate_text(&self.model, &messages, GenerateOpts::default(), None)
            .await
            .map_err(|e| Error::RequestFailed(e.to_string()))?;
        Ok(response.text)
    }
}

/// `learn_skills`/`create_skill` resolve against a fixed in-process catalog loaded
/// from configuration at startup (spec §1: the skill store is out of scope beyond
/// the fields `active_skills` records carry).
pub struct StaticSkillCatalog {
    skills: BTreeMap<String, Skill>,
}

impl StaticSkillCatalog {
    pub fn new(skills: Vec<Skill>) -> Self {
        Self { skills: skills.into_iter().map(|s| (s.name.clone(), s)).collect() }
    }
}

#[async_trait]
impl SkillCatalog for StaticSkillCatalog {
    async fn resolve(&self, names: &[String]) -> Result<Vec<Skill>> {
        names
            .iter()
            .map(|n| self.skills.get(n).cloned().ok_or_else(|| Error::Internal(format!("unknown skill {n}"))))
            .collect()
    }
}

/// `send_message` routed through the live Registry: looks the recipient up by id and
/// posts directly onto its mailbox (spec §4.3's `send_message` action, delivered the
/// same way a sibling agent's mailbox would be reached by the Tree Controller).
pub struct RegistryDirectory {
    registry: Arc<Registry>,
}

impl RegistryDirectory {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl AgentDirectory for RegistryDirectory {
    async fn send_message(&self, from: &AgentId, to: &AgentId, content: String) -> Result<()> {
        let snapshot = self.registry.snapshot(to).ok_or_else(|| Error::RegistryGone(to.to_string()))?;
        snapshot
            .sender
            .send(conclave_agent::AgentMessage::AgentMessage { from_id: from.clone(), content })
            .map_err(|_| Error::RegistryGone(to.to_string()))
    }
}

/// `record_cost`'s append-only ledger and the `spent` figure Budget Escrow reads
/// (spec §4.5, §6). In-memory; a real deployment swaps this for the relational
/// store's cost table without changing the trait.
#[derive(Default)]
pub struct InMemoryCostLedger {
    spent: DashMap<AgentId, Decimal>,
}

impl InMemoryCostLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CostLedger for InMemoryCostLedger {
    async fn record(&self, agent_id: &AgentId, amount: Decimal, _reason: Option<String>) -> Result<()> {
        *self.spent.entry(agent_id.clone()).or_insert(Decimal::ZERO) += amount;
        Ok(())
    }

    async fn spent(&self, agent_id: &AgentId) -> Result<Decimal> {
        Ok(self.spent.get(agent_id).map(|v| *v).unwrap_or(Decimal::ZERO))
    }
}
