//! Per-parameter consensus rule descriptors (spec §4.2, §9 design note).
//!
//! Each action parameter is tagged with one of these; the Consensus Engine (in
//! `conclave-consensus`) dispatches on the tag rather than branching on parameter name.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ConsensusRule {
    ExactMatch,
    SemanticSimilarity { threshold: f64 },
    ModeSelection,
    UnionMerge,
    StructuralMerge,
    Percentile { p: f64 },
    BatchSequenceMerge,
    WaitParameter,
}
