//! Error taxonomy for the orchestration core (spec §7).
//!
//! Kinds, not type names: each variant below is one of Validation, Transient
//! external, Consensus failure, Budget denial, Authorization, or Fatal internal.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum Error {
    // --- Validation ---
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("missing required param: {0}")]
    MissingRequiredParam(String),

    #[error("xor violation in group: {0:?}")]
    XorViolation(Vec<String>),

    #[error("invalid enum value for {param}: {value}")]
    InvalidEnum { param: String, value: String },

    #[error("invalid working dir: {0}")]
    InvalidWorkingDir(String),

    #[error("invalid mode: {0}")]
    InvalidMode(String),

    #[error("file already exists: {0}")]
    FileAlreadyExists(String),

    // --- Transient external ---
    #[error("request timed out")]
    RequestTimeout,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("response too large: {0} bytes")]
    ResponseTooLarge(usize),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    // --- Consensus failure ---
    #[error("no consensus reached among candidates")]
    NoConsensus,

    #[error("sequence length mismatch in batch_sequence_merge")]
    SequenceLengthMismatch,

    #[error("sequence mismatch: differing action at position {0}")]
    SequenceMismatch(usize),

    // --- Budget denial ---
    #[error("insufficient budget")]
    InsufficientBudget,

    #[error("insufficient parent budget")]
    InsufficientParentBudget,

    #[error("budget_required: spawn under root/allocated mode requires an explicit budget")]
    BudgetRequired,

    // --- Authorization ---
    #[error("not_parent")]
    NotParent,

    #[error("not_direct_child")]
    NotDirectChild,

    #[error("parent_dismissing")]
    ParentDismissing,

    // --- Router exit / misc taxonomy from §4.4 ---
    #[error("router exited: {0}")]
    RouterExit(String),

    // --- Fatal internal ---
    #[error("registry entry gone: {0}")]
    RegistryGone(String),

    #[error("supervisor gone")]
    SupervisorGone,

    #[error("all agents failed to restore")]
    AllAgentsFailed,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Error::AuthenticationFailed(reason.into())
    }

    /// True for the Authorization kind, which never retries (spec §7).
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Error::NotParent | Error::NotDirectChild | Error::ParentDismissing
        )
    }

    /// True for the Transient-external kind, which is re-triable by the model
    /// (not auto-retried by the core, except bounded spawn-start retries).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::RequestTimeout
                | Error::ConnectionRefused
                | Error::RequestFailed(_)
                | Error::RateLimitExceeded
                | Error::ServiceUnavailable(_)
        )
    }

    /// True for the Budget-denial kind.
    pub fn is_budget_denial(&self) -> bool {
        matches!(
            self,
            Error::InsufficientBudget | Error::InsufficientParentBudget | Error::BudgetRequired
        )
    }
}
