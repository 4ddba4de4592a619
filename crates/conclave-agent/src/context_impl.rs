//! `AgentContext`: the concrete `ActionContext` an Agent Actor hands to the Action
//! Router for each dispatch. State mutations that belong exclusively to this agent
//! (todos, orientation narrative, active skills) are self-posted back onto the
//! mailbox rather than applied directly, so the actor's own loop remains the only
//! writer of its state. Everything else forwards to a narrow collaborator trait.

use crate::collaborators::{AgentDirectory, AnswerEngineClient, CostLedger, EventPublisher, SecretStore, SkillCatalog, TreeHandle};
use crate::mailbox::{ActionOutcome, AgentMessage, MailboxSender};
use async_trait::async_trait;
use conclave_actions::{ActionContext, SpawnChildRequest};
use conclave_core::{ActionId, AgentId, Error, Result, Value};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct AgentContext {
    pub agent_id: AgentId,
    pub workspace_root: PathBuf,
    pub self_sender: MailboxSender,
    pub tree: Arc<dyn TreeHandle>,
    pub directory: Arc<dyn AgentDirectory>,
    pub secrets: Arc<dyn SecretStore>,
    pub answer_engine: Arc<dyn AnswerEngineClient>,
    pub skills: Arc<dyn SkillCatalog>,
    pub cost_ledger: Arc<dyn CostLedger>,
    pub events: Arc<dyn EventPublisher>,
}

fn post(sender: &MailboxSender, message: AgentMessage) -> Result<()> {
    sender.send(message).map_err(|_| Error::Internal("agent mailbox closed".into()))
}

#[async_trait]
impl ActionContext for AgentContext {
    fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    async fn spawn_child(&self, req: SpawnChildRequest) -> Result<AgentId> {
        self.tree.spawn_child(&self.agent_id, req).await
    }

    async fn dismiss_child(&self, child_id: &AgentId, reason: Option<String>) -> Result<()> {
        self.tree.dismiss_child(&self.agent_id, child_id, reason).await
    }

    async fn adjust_child_budget(&self, child_id: &AgentId, new_allocation: Decimal) -> Result<()> {
        self.tree.adjust_child_budget(&self.agent_id, child_id, new_allocation).await
    }

    async fn record_cost(&self, amount: Decimal, reason: Option<String>) -> Result<()> {
        self.cost_ledger.record(&self.agent_id, amount, reason).await
    }

    async fn send_message(&self, to_agent_id: &AgentId, content: String) -> Result<()> {
        self.directory.send_message(&self.agent_id, to_agent_id, content).await
    }

    async fn resolve_secret(&self, name: &str) -> Result<String> {
        self.secrets.resolve(name).await
    }

    async fn generate_secret(&self, name: &str, length: usize) -> Result<()> {
        self.secrets.generate(name, length).await
    }

    async fn search_secrets(&self, query: &str) -> Result<Vec<String>> {
        self.secrets.search(query).await
    }

    async fn set_todos(&self, items: Vec<BTreeMap<String, Value>>) -> Result<()> {
        post(&self.self_sender, AgentMessage::UpdateTodos { items })
    }

    async fn record_orientation(&self, summary: String) -> Result<()> {
        post(&self.self_sender, AgentMessage::RecordOrientation { summary })
    }

    async fn publish_event(&self, topic: &str, payload: Value) -> Result<()> {
        self.events.publish(topic, payload).await
    }

    async fn ask_answer_engine(&self, question: &str) -> Result<String> {
        self.answer_engine.ask(question).await
    }

    async fn learn_skills(&self, skill_names: Vec<String>) -> Result<()> {
        let skills = self.skills.resolve(&skill_names).await?;
        post(&self.self_sender, AgentMessage::UpdateSkills { skills })
    }

    async fn create_skill(&self, name: &str, content: &str, permanent: bool) -> Result<()> {
        let skill = conclave_core::model::Skill {
            name: name.to_string(),
            description: String::new(),
            path: None,
            content: Some(content.to_string()),
            permanent,
        };
        post(&self.self_sender, AgentMessage::UpdateSkills { skills: vec![skill] })
    }

    async fn post_batch_completed(&self, batch_id: ActionId, results: Vec<(ActionId, Result<Value>)>) -> Result<()> {
        let results = results
            .into_iter()
            .map(|(id, outcome)| {
                let outcome = match outcome {
                    Ok(v) => ActionOutcome::Success(v),
                    Err(e) => ActionOutcome::Failure(e),
                };
                (id, outcome)
            })
            .collect();
        post(&self.self_sender, AgentMessage::BatchCompleted { batch_id, results })
    }
}
