//! Core data model, error taxonomy, and Action Registry shapes shared across the
//! orchestration core (spec §3, §4.3, §6, §7).

pub mod action;
pub mod config;
pub mod consensus_rule;
pub mod error;
pub mod ids;
pub mod model;
pub mod value;

pub use action::{Action, ActionSchema, ActionType, ParamSpec, ParamType};
pub use config::{AuthConfig, AuthMode, BindMode, CoreConfig, GatewayConfig};
pub use consensus_rule::ConsensusRule;
pub use error::{Error, Result};
pub use ids::{ActionId, AgentId, TaskId};
pub use model::{
    Agent, AgentStatus, BudgetData, BudgetMode, HistoryEntry, HistoryEntryKind, ModelHistories,
    Profile, PromptFields, Skill, Task, TaskStatus, TodoItem, TodoState,
};
pub use value::Value;
