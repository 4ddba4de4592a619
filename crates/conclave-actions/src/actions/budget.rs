//! `adjust_budget` and `record_cost`: thin delegations into the Budget Escrow owned by
//! the Agent Actor (spec §4.5 keeps the actual math pure and outside this crate).

use crate::context::ActionContext;
use conclave_core::{AgentId, Result};
use rust_decimal::Decimal;

pub async fn adjust_budget(ctx: &dyn ActionContext, child_id: &str, new_allocation: Decimal) -> Result<()> {
    ctx.adjust_child_budget(&AgentId::from_str(child_id), new_allocation).await
}

pub async fn record_cost(ctx: &dyn ActionContext, amount: Decimal, reason: Option<String>) -> Result<()> {
    ctx.record_cost(amount, reason).await
}
