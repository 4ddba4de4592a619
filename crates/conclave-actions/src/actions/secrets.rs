//! `generate_secret` and `search_secrets`: delegate to the out-of-scope credential
//! store collaborator (spec §1) through `ActionContext`. The Router watches the
//! resolved value with its `Redactor` before the name ever reaches a log line.

use crate::context::ActionContext;
use conclave_core::Result;

pub async fn generate_secret(ctx: &dyn ActionContext, name: &str, length: usize) -> Result<()> {
    ctx.generate_secret(name, length).await
}

pub async fn search_secrets(ctx: &dyn ActionContext, query: &str) -> Result<Vec<String>> {
    ctx.search_secrets(query).await
}
