//! Control-plane actions that only reshape the dispatching agent's own state:
//! `wait`, `orient`, `todo`. None of these touch the filesystem or network.

use crate::context::ActionContext;
use conclave_core::{Error, Result, Value};
use std::collections::BTreeMap;

/// `wait`'s duration is consumed by the Agent Actor's cycle scheduler (spec §4.1), not
/// by the Router — dispatching it here is a no-op acknowledgement.
pub fn wait(_duration: &Value) -> Result<()> {
    Ok(())
}

pub async fn orient(ctx: &dyn ActionContext, summary: String) -> Result<()> {
    ctx.record_orientation(summary).await
}

pub async fn todo(ctx: &dyn ActionContext, items: &Value) -> Result<()> {
    let Value::List(list) = items else {
        return Err(Error::MissingRequiredParam("items".into()));
    };
    let mut parsed = Vec::with_capacity(list.len());
    for item in list {
        let Value::Map(map) = item else {
            return Err(Error::MissingRequiredParam("items[].content".into()));
        };
        parsed.push(map.clone() as BTreeMap<String, Value>);
    }
    ctx.set_todos(parsed).await
}
