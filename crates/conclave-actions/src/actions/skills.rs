//! `learn_skills` and `create_skill`: delegate to the Agent Actor's skill store
//! through `ActionContext`.

use crate::context::ActionContext;
use conclave_core::Result;

pub async fn learn_skills(ctx: &dyn ActionContext, skill_names: Vec<String>) -> Result<()> {
    ctx.learn_skills(skill_names).await
}

pub async fn create_skill(ctx: &dyn ActionContext, name: &str, content: &str, permanent: bool) -> Result<()> {
    ctx.create_skill(name, content, permanent).await
}
