//! Action Registry & schema types (spec §4.3, §6).
//!
//! `ActionType` is the closed, versioned enum; `ActionSchema` carries everything the
//! Validator (in `conclave-actions`) needs to check a candidate `Action` without
//! executing it. This module only describes shape — it has no side effects.

use crate::consensus_rule::ConsensusRule;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SpawnChild,
    DismissChild,
    SendMessage,
    Wait,
    Orient,
    Todo,
    AdjustBudget,
    RecordCost,
    Shell,
    FetchWeb,
    CallApi,
    CallMcp,
    FileRead,
    FileWrite,
    GenerateSecret,
    SearchSecrets,
    AnswerEngine,
    LearnSkills,
    CreateSkill,
    BatchSync,
    BatchAsync,
}

impl ActionType {
    pub const ALL: [ActionType; 21] = [
        ActionType::SpawnChild,
        ActionType::DismissChild,
        ActionType::SendMessage,
        ActionType::Wait,
        ActionType::Orient,
        ActionType::Todo,
        ActionType::AdjustBudget,
        ActionType::RecordCost,
        ActionType::Shell,
        ActionType::FetchWeb,
        ActionType::CallApi,
        ActionType::CallMcp,
        ActionType::FileRead,
        ActionType::FileWrite,
        ActionType::GenerateSecret,
        ActionType::SearchSecrets,
        ActionType::AnswerEngine,
        ActionType::LearnSkills,
        ActionType::CreateSkill,
        ActionType::BatchSync,
        ActionType::BatchAsync,
    ];

    /// Priority used to tiebreak consensus when multiple action types tie on vote
    /// count (spec §4.2: "more conservative wins"). Lower number wins the tiebreak.
    pub fn priority(&self) -> i32 {
        match self {
            ActionType::Wait => 1,
            ActionType::Orient => 2,
            ActionType::Todo => 2,
            ActionType::SearchSecrets => 2,
            ActionType::SendMessage => 3,
            ActionType::LearnSkills => 3,
            ActionType::CreateSkill => 3,
            ActionType::RecordCost => 4,
            ActionType::GenerateSecret => 4,
            ActionType::FetchWeb => 5,
            ActionType::FileRead => 5,
            ActionType::AnswerEngine => 5,
            ActionType::CallApi => 6,
            ActionType::CallMcp => 6,
            ActionType::AdjustBudget => 7,
            ActionType::FileWrite => 7,
            ActionType::DismissChild => 8,
            ActionType::SpawnChild => 9,
            ActionType::Shell => 10,
            ActionType::BatchSync => 11,
            ActionType::BatchAsync => 12,
        }
    }

    /// True for the two batch kinds; batch actions may not nest (spec §6).
    pub fn is_batch(&self) -> bool {
        matches!(self, ActionType::BatchSync | ActionType::BatchAsync)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SpawnChild => "spawn_child",
            ActionType::DismissChild => "dismiss_child",
            ActionType::SendMessage => "send_message",
            ActionType::Wait => "wait",
            ActionType::Orient => "orient",
            ActionType::Todo => "todo",
            ActionType::AdjustBudget => "adjust_budget",
            ActionType::RecordCost => "record_cost",
            ActionType::Shell => "shell",
            ActionType::FetchWeb => "fetch_web",
            ActionType::CallApi => "call_api",
            ActionType::CallMcp => "call_mcp",
            ActionType::FileRead => "file_read",
            ActionType::FileWrite => "file_write",
            ActionType::GenerateSecret => "generate_secret",
            ActionType::SearchSecrets => "search_secrets",
            ActionType::AnswerEngine => "answer_engine",
            ActionType::LearnSkills => "learn_skills",
            ActionType::CreateSkill => "create_skill",
            ActionType::BatchSync => "batch_sync",
            ActionType::BatchAsync => "batch_async",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The shape a parameter's value must take, for the Validator.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamType {
    Bool,
    Int,
    Float,
    Decimal,
    Str,
    List(Box<ParamType>),
    Map(Box<ParamType>),
    /// Nested map with a fixed set of keys. `all_optional` allows any subset.
    NestedMap {
        keys: Vec<String>,
        all_optional: bool,
    },
    Enum(Vec<String>),
    Union(Vec<ParamType>),
    /// A full embedded `Action` (for batch_sync/batch_async sub-actions).
    ActionSpec,
}

#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub consensus_rule: ConsensusRule,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: ParamType, rule: ConsensusRule) -> Self {
        Self {
            name: name.into(),
            ty,
            consensus_rule: rule,
        }
    }
}

/// One alternative in an XOR group: the set of param names that, together, satisfy
/// that alternative (usually a single name, e.g. shell's `command` vs `check_id`).
pub type XorAlternative = Vec<String>;

#[derive(Clone, Debug)]
pub struct ActionSchema {
    pub action_type: ActionType,
    pub required: Vec<ParamSpec>,
    pub optional: Vec<ParamSpec>,
    /// Groups of mutually exclusive alternatives; each inner Vec<XorAlternative> is
    /// one XOR constraint (exactly one alternative's params must be present).
    pub xor_groups: Vec<Vec<XorAlternative>>,
    pub capability_group: String,
    pub wait_param_required: bool,
    pub description: &'static str,
}

impl ActionSchema {
    pub fn priority(&self) -> i32 {
        self.action_type.priority()
    }

    pub fn consensus_rule_for(&self, param: &str) -> Option<ConsensusRule> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .find(|p| p.name == param)
            .map(|p| p.consensus_rule)
    }
}

/// A typed, schema-validated operation an Agent may dispatch (glossary: Action).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub params: BTreeMap<String, Value>,
    pub reasoning: Option<String>,
}

impl Action {
    pub fn new(action_type: ActionType, params: BTreeMap<String, Value>) -> Self {
        Self {
            action_type,
            params,
            reasoning: None,
        }
    }
}

fn exact(name: &str) -> ParamSpec {
    ParamSpec::new(name, ParamType::Str, ConsensusRule::ExactMatch)
}

/// Builds the full, closed Action Registry (spec §6).
pub fn registry() -> BTreeMap<ActionType, ActionSchema> {
    use ActionType::*;
    use ConsensusRule::*;
    use ParamType::*;

    let mut m = BTreeMap::new();

    m.insert(
        SpawnChild,
        ActionSchema {
            action_type: SpawnChild,
            required: vec![
                exact("task_description"),
                ParamSpec::new("profile_name", Str, ExactMatch),
            ],
            optional: vec![
                ParamSpec::new("success_criteria", Str, SemanticSimilarity { threshold: 0.85 }),
                ParamSpec::new("immediate_context", Str, SemanticSimilarity { threshold: 0.85 }),
                ParamSpec::new("approach_guidance", Str, SemanticSimilarity { threshold: 0.85 }),
                ParamSpec::new("role", Str, ModeSelection),
                ParamSpec::new("budget", Decimal, Percentile { p: 0.5 }),
                ParamSpec::new("downstream_constraints", List(Box::new(Str)), UnionMerge),
            ],
            xor_groups: vec![],
            capability_group: "tree".into(),
            wait_param_required: false,
            description: "Spawn a child agent under the current agent.",
        },
    );

    m.insert(
        DismissChild,
        ActionSchema {
            action_type: DismissChild,
            required: vec![ParamSpec::new("child_id", Str, ExactMatch)],
            optional: vec![ParamSpec::new("reason", Str, ModeSelection)],
            xor_groups: vec![],
            capability_group: "tree".into(),
            wait_param_required: false,
            description: "Dismiss (recursively terminate) a direct child agent.",
        },
    );

    m.insert(
        SendMessage,
        ActionSchema {
            action_type: SendMessage,
            required: vec![
                ParamSpec::new("to_agent_id", Str, ExactMatch),
                ParamSpec::new("content", Str, SemanticSimilarity { threshold: 0.9 }),
            ],
            optional: vec![],
            xor_groups: vec![],
            capability_group: "communication".into(),
            wait_param_required: false,
            description: "Send an inter-agent message.",
        },
    );

    m.insert(
        Wait,
        ActionSchema {
            action_type: Wait,
            required: vec![ParamSpec::new("duration", Union(vec![Bool, Int, Float]), WaitParameter)],
            optional: vec![],
            xor_groups: vec![],
            capability_group: "control".into(),
            wait_param_required: true,
            description: "Pause consensus cycles for a duration or indefinitely.",
        },
    );

    m.insert(
        Orient,
        ActionSchema {
            action_type: Orient,
            required: vec![ParamSpec::new("summary", Str, SemanticSimilarity { threshold: 0.8 })],
            optional: vec![],
            xor_groups: vec![],
            capability_group: "control".into(),
            wait_param_required: false,
            description: "Record an orientation/self-summary entry.",
        },
    );

    m.insert(
        Todo,
        ActionSchema {
            action_type: Todo,
            required: vec![ParamSpec::new(
                "items",
                List(Box::new(NestedMap {
                    keys: vec!["content".into(), "state".into()],
                    all_optional: false,
                })),
                UnionMerge,
            )],
            optional: vec![],
            xor_groups: vec![],
            capability_group: "control".into(),
            wait_param_required: false,
            description: "Replace the agent's TODO list.",
        },
    );

    m.insert(
        AdjustBudget,
        ActionSchema {
            action_type: AdjustBudget,
            required: vec![
                ParamSpec::new("child_id", Str, ExactMatch),
                ParamSpec::new("new_allocation", Decimal, Percentile { p: 0.5 }),
            ],
            optional: vec![],
            xor_groups: vec![],
            capability_group: "budget".into(),
            wait_param_required: false,
            description: "Adjust a direct child's budget allocation.",
        },
    );

    m.insert(
        RecordCost,
        ActionSchema {
            action_type: RecordCost,
            required: vec![ParamSpec::new("amount", Decimal, Percentile { p: 0.5 })],
            optional: vec![ParamSpec::new("reason", Str, ModeSelection)],
            xor_groups: vec![],
            capability_group: "budget".into(),
            wait_param_required: false,
            description: "Record a cost against this agent's spend.",
        },
    );

    m.insert(
        Shell,
        ActionSchema {
            action_type: Shell,
            required: vec![],
            optional: vec![
                ParamSpec::new("command", Str, ExactMatch),
                ParamSpec::new("check_id", Str, ExactMatch),
                ParamSpec::new("working_dir", Str, ExactMatch),
                ParamSpec::new("terminate", Bool, ModeSelection),
            ],
            xor_groups: vec![vec![vec!["command".into()], vec!["check_id".into()]]],
            capability_group: "shell".into(),
            wait_param_required: false,
            description: "Execute (or check/terminate) a shell command.",
        },
    );

    m.insert(
        FetchWeb,
        ActionSchema {
            action_type: FetchWeb,
            required: vec![ParamSpec::new("url", Str, ExactMatch)],
            optional: vec![ParamSpec::new("method", Str, ExactMatch)],
            xor_groups: vec![],
            capability_group: "network".into(),
            wait_param_required: false,
            description: "Fetch a web resource and convert it to markdown.",
        },
    );

    m.insert(
        CallApi,
        ActionSchema {
            action_type: CallApi,
            required: vec![ParamSpec::new("url", Str, ExactMatch)],
            optional: vec![
                ParamSpec::new("method", Str, ExactMatch),
                ParamSpec::new(
                    "headers",
                    Map(Box::new(Str)),
                    StructuralMerge,
                ),
                ParamSpec::new("body", Str, StructuralMerge),
                ParamSpec::new("credential_name", Str, ExactMatch),
            ],
            xor_groups: vec![],
            capability_group: "network".into(),
            wait_param_required: false,
            description: "Call an HTTP API; credential_name, if given, is resolved through the secret store and sent as a bearer token.",
        },
    );

    m.insert(
        CallMcp,
        ActionSchema {
            action_type: CallMcp,
            required: vec![ParamSpec::new("tool", Str, ExactMatch)],
            optional: vec![
                ParamSpec::new("transport", Str, ExactMatch),
                ParamSpec::new("connection_id", Str, ExactMatch),
                ParamSpec::new("args", Map(Box::new(Str)), StructuralMerge),
            ],
            xor_groups: vec![vec![vec!["transport".into()], vec!["connection_id".into()]]],
            capability_group: "mcp".into(),
            wait_param_required: false,
            description: "Call an MCP tool over a transport or an existing connection.",
        },
    );

    m.insert(
        FileRead,
        ActionSchema {
            action_type: FileRead,
            required: vec![ParamSpec::new("path", Str, ExactMatch)],
            optional: vec![
                ParamSpec::new("offset", Int, Percentile { p: 0.5 }),
                ParamSpec::new("limit", Int, Percentile { p: 0.5 }),
            ],
            xor_groups: vec![],
            capability_group: "filesystem".into(),
            wait_param_required: false,
            description: "Read a file's contents.",
        },
    );

    m.insert(
        FileWrite,
        ActionSchema {
            action_type: FileWrite,
            required: vec![
                ParamSpec::new("path", Str, ExactMatch),
                ParamSpec::new("mode", Enum(vec!["write".into(), "edit".into()]), ExactMatch),
            ],
            optional: vec![
                ParamSpec::new("content", Str, StructuralMerge),
                ParamSpec::new("old_string", Str, ExactMatch),
                ParamSpec::new("new_string", Str, StructuralMerge),
                ParamSpec::new("replace_all", Bool, ModeSelection),
            ],
            xor_groups: vec![],
            capability_group: "filesystem".into(),
            wait_param_required: false,
            description: "Write or edit a file.",
        },
    );

    m.insert(
        GenerateSecret,
        ActionSchema {
            action_type: GenerateSecret,
            required: vec![ParamSpec::new("name", Str, ExactMatch)],
            optional: vec![ParamSpec::new("length", Int, Percentile { p: 0.5 })],
            xor_groups: vec![],
            capability_group: "secrets".into(),
            wait_param_required: false,
            description: "Generate and store a new secret.",
        },
    );

    m.insert(
        SearchSecrets,
        ActionSchema {
            action_type: SearchSecrets,
            required: vec![ParamSpec::new("query", Str, ExactMatch)],
            optional: vec![],
            xor_groups: vec![],
            capability_group: "secrets".into(),
            wait_param_required: false,
            description: "Search known secret names.",
        },
    );

    m.insert(
        AnswerEngine,
        ActionSchema {
            action_type: AnswerEngine,
            required: vec![ParamSpec::new("question", Str, SemanticSimilarity { threshold: 0.85 })],
            optional: vec![],
            xor_groups: vec![],
            capability_group: "network".into(),
            wait_param_required: false,
            description: "Ask the configured answer engine a question.",
        },
    );

    m.insert(
        LearnSkills,
        ActionSchema {
            action_type: LearnSkills,
            required: vec![ParamSpec::new("skill_names", List(Box::new(Str)), UnionMerge)],
            optional: vec![],
            xor_groups: vec![],
            capability_group: "skills".into(),
            wait_param_required: false,
            description: "Load skill records into active_skills.",
        },
    );

    m.insert(
        CreateSkill,
        ActionSchema {
            action_type: CreateSkill,
            required: vec![
                ParamSpec::new("name", Str, ExactMatch),
                ParamSpec::new("content", Str, StructuralMerge),
            ],
            optional: vec![ParamSpec::new("permanent", Bool, ModeSelection)],
            xor_groups: vec![],
            capability_group: "skills".into(),
            wait_param_required: false,
            description: "Persist a new reusable skill record.",
        },
    );

    m.insert(
        BatchSync,
        ActionSchema {
            action_type: BatchSync,
            required: vec![ParamSpec::new("actions", List(Box::new(ActionSpec)), BatchSequenceMerge)],
            optional: vec![],
            xor_groups: vec![],
            capability_group: "control".into(),
            wait_param_required: false,
            description: "Execute sub-actions in order, stopping at the first failure.",
        },
    );

    m.insert(
        BatchAsync,
        ActionSchema {
            action_type: BatchAsync,
            required: vec![ParamSpec::new("actions", List(Box::new(ActionSpec)), BatchSequenceMerge)],
            optional: vec![],
            xor_groups: vec![],
            capability_group: "control".into(),
            wait_param_required: false,
            description: "Execute sub-actions concurrently; report batch_completed.",
        },
    );

    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_all_21_actions() {
        let reg = registry();
        assert_eq!(reg.len(), 21);
        for a in ActionType::ALL {
            assert!(reg.contains_key(&a), "missing schema for {a}");
        }
    }

    #[test]
    fn batch_actions_cannot_nest_by_construction() {
        // ActionSpec sub-actions carry their own ActionType; batch schemas don't
        // special-case nested batches, so nesting is rejected at validation time
        // (see conclave-actions::registry::Validator), not representable here.
        assert!(ActionType::BatchSync.is_batch());
        assert!(ActionType::BatchAsync.is_batch());
    }

    #[test]
    fn priorities_match_spec() {
        assert_eq!(ActionType::Wait.priority(), 1);
        assert_eq!(ActionType::Shell.priority(), 10);
        assert_eq!(ActionType::BatchAsync.priority(), 12);
    }
}
