//! Consensus Engine (spec §4.2): reduces multiple models' proposed actions into a
//! single dispatchable `Action` per agent cycle.

pub mod cost;
pub mod engine;

pub use cost::CostAccumulator;
pub use engine::{merge_candidates, Candidate};
