//! `spawn_child` and `dismiss_child`: delegate into the Tree Lifecycle Controller
//! (spec §4.6) through `ActionContext` — this crate never touches the agent tree
//! directly.

use crate::context::{ActionContext, SpawnChildRequest};
use conclave_core::{AgentId, Result};

pub async fn spawn_child(ctx: &dyn ActionContext, req: SpawnChildRequest) -> Result<AgentId> {
    ctx.spawn_child(req).await
}

pub async fn dismiss_child(ctx: &dyn ActionContext, child_id: &str, reason: Option<String>) -> Result<()> {
    ctx.dismiss_child(&AgentId::from_str(child_id), reason).await
}
