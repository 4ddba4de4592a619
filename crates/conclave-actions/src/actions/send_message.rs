//! `send_message`: inter-agent messaging, delegated to the Agent Actor's mailbox
//! (spec §4.1) through `ActionContext`.

use crate::context::ActionContext;
use conclave_core::{AgentId, Result};

pub async fn send_message(ctx: &dyn ActionContext, to_agent_id: &str, content: String) -> Result<()> {
    ctx.send_message(&AgentId::from_str(to_agent_id), content).await
}
