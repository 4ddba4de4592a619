//! Action Registry & Validator, the Action Router, and the 21 Action implementations
//! (spec §4.3, §4.4, §6). This crate is deliberately ignorant of `conclave-agent` and
//! `conclave-tree` — it reaches into the owning agent only through `ActionContext`.

pub mod actions;
pub mod context;
pub mod router;
pub mod secret;
pub mod validator;

pub use context::{ActionContext, SpawnChildRequest};
pub use router::ActionRouter;
pub use secret::Redactor;
pub use validator::Validator;

pub use actions::shell::{ShellDispatch, ShellOutcome, ShellRegistry};
