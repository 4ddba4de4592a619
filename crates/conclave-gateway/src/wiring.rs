//! Assembles the real collaborators named only as narrow traits everywhere else in
//! the workspace: the LLM provider, the Action Router, the Tree Lifecycle
//! Controller, and the `ActorFactory` closure it needs to start an Agent Actor.
//! Grounded on the donor's `server.rs::start_gateway`, trimmed to construction only
//! — the HTTP surface itself lives in `server.rs`.

use conclave_actions::{ActionRouter, ShellRegistry};
use conclave_agent::collaborators::{CostLedger, EventPublisher, TreeHandle};
use conclave_agent::{AgentActor, AgentContext, AgentStore, Mailbox};
use conclave_core::action::registry;
use conclave_core::config::RouterConfig;
use conclave_core::model::{Agent, Profile};
use conclave_core::Result;
use conclave_llm::{AnthropicProvider, LlmProvider};
use conclave_tree::{ActorFactory, EventBus, EventBusPublisher, InMemoryStore, ProfileCatalog, Registry, TreeController};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::collaborators::{EnvSecretStore, InMemoryCostLedger, LlmAnswerEngine, RegistryDirectory, StaticSkillCatalog};

/// Resolves a profile name against a fixed `CoreConfig::profiles` map (spec §1: the
/// profile catalog's storage is out of scope, just the fields it carries).
pub struct ConfiguredProfiles {
    profiles: BTreeMap<String, Profile>,
}

impl ConfiguredProfiles {
    pub fn new(profiles: BTreeMap<String, Profile>) -> Self {
        Self { profiles }
    }
}

#[async_trait::async_trait]
impl ProfileCatalog for ConfiguredProfiles {
    async fn resolve(&self, profile_name: &str) -> Result<Profile> {
        self.profiles
            .get(profile_name)
            .cloned()
            .ok_or_else(|| conclave_core::Error::Internal(format!("unknown profile {profile_name}")))
    }
}

pub struct Supervisor {
    pub tree: Arc<TreeController>,
    pub registry: Arc<Registry>,
    pub store: Arc<InMemoryStore>,
    pub events: Arc<EventBus>,
}

/// Builds the Supervisor's collaborator graph and wires the `ActorFactory` the Tree
/// Lifecycle Controller needs back into a `TreeController` that doesn't exist until
/// the factory closure does — the same `Arc::new_cyclic` indirection the donor's own
/// `AgentRuntime` avoids only because it has no tree to reference back into.
pub fn build_supervisor(
    anthropic_api_key: String,
    default_model: String,
    profiles: BTreeMap<String, Profile>,
    workspace_root: PathBuf,
) -> Supervisor {
    let registry = Arc::new(Registry::new());
    let store = Arc::new(InMemoryStore::new());
    let events = Arc::new(EventBus::new());
    let profile_catalog = Arc::new(ConfiguredProfiles::new(profiles));
    let cost_ledger: Arc<dyn CostLedger> = Arc::new(InMemoryCostLedger::new());
    let provider: Arc<dyn LlmProvider> = Arc::new(AnthropicProvider::new(&anthropic_api_key));

    let tree = Arc::new_cyclic(|weak: &std::sync::Weak<TreeController>| {
        let factory = build_actor_factory(
            Arc::new(WeakTreeHandle(weak.clone())),
            store.clone(),
            registry.clone(),
            events.clone(),
            provider.clone(),
            default_model,
            workspace_root,
        );
        TreeController::new(registry.clone(), store.clone(), events.clone(), profile_catalog, cost_ledger, factory)
    });

    Supervisor { tree, registry, store, events }
}

struct WeakTreeHandle(std::sync::Weak<TreeController>);

#[async_trait::async_trait]
impl TreeHandle for WeakTreeHandle {
    async fn spawn_child(&self, parent: &conclave_core::AgentId, req: conclave_actions::SpawnChildRequest) -> Result<conclave_core::AgentId> {
        self.0.upgrade().ok_or_else(|| conclave_core::Error::SupervisorGone)?.spawn_child(parent, req).await
    }
    async fn dismiss_child(&self, parent: &conclave_core::AgentId, child: &conclave_core::AgentId, reason: Option<String>) -> Result<()> {
        self.0.upgrade().ok_or_else(|| conclave_core::Error::SupervisorGone)?.dismiss_child(parent, child, reason).await
    }
    async fn adjust_child_budget(&self, parent: &conclave_core::AgentId, child: &conclave_core::AgentId, new_allocation: rust_decimal::Decimal) -> Result<()> {
        self.0
            .upgrade()
            .ok_or_else(|| conclave_core::Error::SupervisorGone)?
            .adjust_child_budget(parent, child, new_allocation)
            .await
    }
}

#[allow(clippy::too_many_arguments)]
fn build_actor_factory(
    tree: Arc<dyn TreeHandle>,
    store: Arc<InMemoryStore>,
    tree_registry: Arc<Registry>,
    events: Arc<EventBus>,
    provider: Arc<dyn LlmProvider>,
    default_model: String,
    workspace_root: PathBuf,
) -> ActorFactory {
    let agent_store: Arc<dyn AgentStore> = store;
    let event_publisher: Arc<dyn EventPublisher> = Arc::new(EventBusPublisher { bus: events });
    let directory = Arc::new(RegistryDirectory::new(tree_registry));
    let secrets = Arc::new(EnvSecretStore::new("CONCLAVE_SECRET_"));
    let answer_engine = Arc::new(LlmAnswerEngine::new(provider.clone(), default_model));
    let skills = Arc::new(StaticSkillCatalog::new(Vec::new()));
    let cost_ledger: Arc<dyn CostLedger> = Arc::new(InMemoryCostLedger::new());

    Arc::new(move |agent: Agent| {
        let action_registry = Arc::new(registry());
        let router = Arc::new(ActionRouter::new(action_registry.clone(), RouterConfig::default(), ShellRegistry::new()));
        let (self_sender, mailbox) = Mailbox::channel();
        let context = Arc::new(AgentContext {
            agent_id: agent.agent_id.clone(),
            workspace_root: workspace_root.clone(),
            self_sender: self_sender.clone(),
            tree: tree.clone(),
            directory: directory.clone(),
            secrets: secrets.clone(),
            answer_engine: answer_engine.clone(),
            skills: skills.clone(),
            cost_ledger: cost_ledger.clone(),
            events: event_publisher.clone(),
        });
        let actor = AgentActor::new(agent, mailbox, self_sender.clone(), provider.clone(), action_registry, router, context, agent_store.clone());
        (actor, self_sender)
    })
}
