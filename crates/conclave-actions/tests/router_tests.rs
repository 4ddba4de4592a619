//! Router-level integration tests: one mock `ActionContext` standing in for the
//! owning Agent Actor, matching the donor's `MockRegistry` pattern for exercising a
//! tool/router in isolation from the real runtime.

use async_trait::async_trait;
use conclave_actions::{ActionContext, ActionRouter, ShellRegistry, SpawnChildRequest};
use conclave_core::action::registry;
use conclave_core::config::RouterConfig;
use conclave_core::{Action, ActionId, ActionType, AgentId, Result, Value};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MockState {
    orientations: Vec<String>,
    todos: Vec<BTreeMap<String, Value>>,
    sent_messages: Vec<(String, String)>,
    spawned: Vec<SpawnChildRequest>,
    costs: Vec<Decimal>,
    batch_completions: Vec<(ActionId, Vec<(ActionId, Result<Value>)>)>,
}

struct MockActionContext {
    agent_id: AgentId,
    workspace_root: PathBuf,
    state: Mutex<MockState>,
}

impl MockActionContext {
    fn new(workspace_root: PathBuf) -> Self {
        Self {
            agent_id: AgentId::new(),
            workspace_root,
            state: Mutex::new(MockState::default()),
        }
    }
}

#[async_trait]
impl ActionContext for MockActionContext {
    fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    async fn spawn_child(&self, req: SpawnChildRequest) -> Result<AgentId> {
        let id = AgentId::new();
        self.state.lock().unwrap().spawned.push(req);
        Ok(id)
    }

    async fn dismiss_child(&self, _child_id: &AgentId, _reason: Option<String>) -> Result<()> {
        Ok(())
    }

    async fn adjust_child_budget(&self, _child_id: &AgentId, _new_allocation: Decimal) -> Result<()> {
        Ok(())
    }

    async fn record_cost(&self, amount: Decimal, _reason: Option<String>) -> Result<()> {
        self.state.lock().unwrap().costs.push(amount);
        Ok(())
    }

    async fn send_message(&self, to_agent_id: &AgentId, content: String) -> Result<()> {
        self.state.lock().unwrap().sent_messages.push((to_agent_id.as_str().to_string(), content));
        Ok(())
    }

    async fn resolve_secret(&self, name: &str) -> Result<String> {
        Ok(format!("secret-value-for-{name}"))
    }

    async fn generate_secret(&self, _name: &str, _length: usize) -> Result<()> {
        Ok(())
    }

    async fn search_secrets(&self, _query: &str) -> Result<Vec<String>> {
        Ok(vec!["known-secret".into()])
    }

    async fn set_todos(&self, items: Vec<BTreeMap<String, Value>>) -> Result<()> {
        self.state.lock().unwrap().todos = items;
        Ok(())
    }

    async fn record_orientation(&self, summary: String) -> Result<()> {
        self.state.lock().unwrap().orientations.push(summary);
        Ok(())
    }

    async fn publish_event(&self, _topic: &str, _payload: Value) -> Result<()> {
        Ok(())
    }

    async fn ask_answer_engine(&self, question: &str) -> Result<String> {
        Ok(format!("answer to: {question}"))
    }

    async fn learn_skills(&self, _skill_names: Vec<String>) -> Result<()> {
        Ok(())
    }

    async fn create_skill(&self, _name: &str, _content: &str, _permanent: bool) -> Result<()> {
        Ok(())
    }

    async fn post_batch_completed(&self, batch_id: ActionId, results: Vec<(ActionId, Result<Value>)>) -> Result<()> {
        self.state.lock().unwrap().batch_completions.push((batch_id, results));
        Ok(())
    }
}

fn make_router() -> Arc<ActionRouter> {
    Arc::new(ActionRouter::new(Arc::new(registry()), RouterConfig::default(), ShellRegistry::new()))
}

fn action(ty: ActionType, params: &[(&str, Value)]) -> Action {
    Action::new(ty, params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
}

#[tokio::test]
async fn orient_records_orientation_through_context() {
    let router = make_router();
    let ctx = Arc::new(MockActionContext::new(std::env::temp_dir()));
    let a = action(ActionType::Orient, &[("summary", Value::Str("looking into the failing test".into()))]);
    let result = router.clone().dispatch(&a, ctx.clone()).await;
    assert!(result.is_ok());
    assert_eq!(ctx.state.lock().unwrap().orientations, vec!["looking into the failing test".to_string()]);
}

#[tokio::test]
async fn invalid_action_is_rejected_before_any_execution() {
    let router = make_router();
    let ctx = Arc::new(MockActionContext::new(std::env::temp_dir()));
    let a = action(ActionType::SpawnChild, &[]);
    let result = router.clone().dispatch(&a, ctx.clone()).await;
    assert!(result.is_err());
    assert!(ctx.state.lock().unwrap().spawned.is_empty());
}

#[tokio::test]
async fn spawn_child_reaches_context_with_parsed_request() {
    let router = make_router();
    let ctx = Arc::new(MockActionContext::new(std::env::temp_dir()));
    let a = action(
        ActionType::SpawnChild,
        &[
            ("task_description", Value::Str("fix the bug".into())),
            ("profile_name", Value::Str("worker".into())),
        ],
    );
    let result = router.clone().dispatch(&a, ctx.clone()).await;
    assert!(result.is_ok());
    let spawned = &ctx.state.lock().unwrap().spawned;
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].task_description, "fix the bug");
}

#[tokio::test]
async fn generate_secret_output_is_redacted() {
    let router = make_router();
    let ctx = Arc::new(MockActionContext::new(std::env::temp_dir()));
    let a = action(ActionType::GenerateSecret, &[("name", Value::Str("api-key".into()))]);
    let result = router.clone().dispatch(&a, ctx.clone()).await.unwrap();
    assert_eq!(result, Value::Null);
}

#[tokio::test]
async fn file_write_then_read_round_trips_through_router() {
    let dir = tempfile::tempdir().unwrap();
    let router = make_router();
    let ctx = Arc::new(MockActionContext::new(dir.path().to_path_buf()));

    let write = action(
        ActionType::FileWrite,
        &[
            ("path", Value::Str("notes.txt".into())),
            ("mode", Value::Str("write".into())),
            ("content", Value::Str("hello from the router".into())),
        ],
    );
    router.clone().dispatch(&write, ctx.clone()).await.unwrap();

    let read = action(ActionType::FileRead, &[("path", Value::Str("notes.txt".into()))]);
    let result = router.clone().dispatch(&read, ctx.clone()).await.unwrap();
    let Value::Str(text) = result else { panic!("expected string result") };
    assert!(text.contains("hello from the router"));
}

#[tokio::test]
async fn batch_sync_stops_at_first_failure() {
    // Every sub-action here is individually well-formed (so it clears up-front batch
    // validation); the first one fails at execution time by referencing an unknown
    // shell check_id, so the second (orient) should never run.
    let router = make_router();
    let ctx = Arc::new(MockActionContext::new(std::env::temp_dir()));

    let mut failing_shell_params = BTreeMap::new();
    failing_shell_params.insert("type".to_string(), Value::Str("shell".into()));
    let mut shell_inner = BTreeMap::new();
    shell_inner.insert("check_id".to_string(), Value::Str("no-such-check-id".into()));
    failing_shell_params.insert("params".to_string(), Value::Map(shell_inner));

    let mut good_orient_params = BTreeMap::new();
    good_orient_params.insert("type".to_string(), Value::Str("orient".into()));
    let mut orient_inner = BTreeMap::new();
    orient_inner.insert("summary".to_string(), Value::Str("hi".into()));
    good_orient_params.insert("params".to_string(), Value::Map(orient_inner));

    let actions = Value::List(vec![Value::Map(failing_shell_params), Value::Map(good_orient_params)]);
    let a = action(ActionType::BatchSync, &[("actions", actions)]);
    let result = router.clone().dispatch(&a, ctx.clone()).await.unwrap();
    let Value::List(items) = result else { panic!("expected list result") };
    assert_eq!(items.len(), 1);
    assert!(ctx.state.lock().unwrap().orientations.is_empty());
}

#[tokio::test]
async fn shell_fast_command_completes_synchronously_through_router() {
    let router = make_router();
    let ctx = Arc::new(MockActionContext::new(std::env::temp_dir()));
    let a = action(ActionType::Shell, &[("command", Value::Str("echo hi".into()))]);
    let result = router.clone().dispatch(&a, ctx.clone()).await.unwrap();
    let Value::Map(map) = result else { panic!("expected map result") };
    assert_eq!(map.get("status"), Some(&Value::Str("done".into())));
}

#[tokio::test]
async fn batch_async_acknowledges_immediately_and_completes_in_background() {
    let router = make_router();
    let ctx = Arc::new(MockActionContext::new(std::env::temp_dir()));

    let mut orient_params = BTreeMap::new();
    orient_params.insert("type".to_string(), Value::Str("orient".into()));
    let mut orient_inner = BTreeMap::new();
    orient_inner.insert("summary".to_string(), Value::Str("background orient".into()));
    orient_params.insert("params".to_string(), Value::Map(orient_inner));

    let actions = Value::List(vec![Value::Map(orient_params)]);
    let a = action(ActionType::BatchAsync, &[("actions", actions)]);
    let result = router.clone().dispatch(&a, ctx.clone()).await.unwrap();

    let Value::Map(map) = result else { panic!("expected map result") };
    assert_eq!(map.get("status"), Some(&Value::Str("pending".into())));
    assert!(matches!(map.get("batch_id"), Some(Value::Str(_))));

    // The batch finishes on a detached task; give it a chance to run and post back.
    for _ in 0..50 {
        if !ctx.state.lock().unwrap().batch_completions.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let completions = &ctx.state.lock().unwrap().batch_completions;
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].1.len(), 1);
    assert!(completions[0].1[0].1.is_ok());
}
