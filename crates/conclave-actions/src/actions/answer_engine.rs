//! `answer_engine`: asks the configured answer engine (an out-of-scope collaborator,
//! spec §1) a question through `ActionContext`.

use crate::context::ActionContext;
use conclave_core::Result;

pub async fn answer_engine(ctx: &dyn ActionContext, question: &str) -> Result<String> {
    ctx.ask_answer_engine(question).await
}
