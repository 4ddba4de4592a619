//! The Agent Actor (spec §4.1, §4.5): one actor per live agent, owning its own
//! `Agent` state, mailbox, consensus cycle, and Budget Escrow. Reaches the Action
//! Router through `conclave_actions::ActionContext`, and reaches everything spec §1
//! calls out-of-scope (Tree Lifecycle Controller, Registry, persistent store, pub/sub
//! bus, credential store, answer engine, skill catalog) only through the narrow
//! collaborator traits in `collaborators.rs`.

pub mod actor;
pub mod budget;
pub mod collaborators;
pub mod context_impl;
pub mod mailbox;
pub mod prompt;

pub use actor::AgentActor;
pub use collaborators::{AgentDirectory, AgentStore, AnswerEngineClient, CostLedger, EventPublisher, SecretStore, SkillCatalog, TreeHandle};
pub use context_impl::AgentContext;
pub use mailbox::{ActionOutcome, AgentMessage, Mailbox, MailboxSender};
