//! LLM provider adapter contract (spec §6): a single call surface the core treats as
//! opaque — `generate_text` and `embed`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub type LlmResult<T> = Result<T, LlmError>;

#[derive(Debug, thiserror::Error, Clone)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("cancelled")]
    Cancelled,
}

impl LlmError {
    /// Maps onto the `reason` classification spec.md §6 requires from
    /// `generate_text`'s error path.
    pub fn reason(&self) -> &'static str {
        match self {
            LlmError::AuthFailed(_) => "authentication_failed",
            LlmError::RateLimited { .. } => "rate_limit_exceeded",
            LlmError::ServiceUnavailable(_) => "service_unavailable",
            _ => "provider_error",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GenerateOpts {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct EmbedOpts {
    pub model: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct GenerationResponse {
    /// Raw model text. The Agent Actor parses this into a `{action, params}`
    /// candidate via the Validator; the provider does not know about actions.
    pub text: String,
    pub usage: Usage,
}

/// LLM provider adapter (spec §6). The core never depends on a concrete provider,
/// only on this trait object.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn models(&self) -> &[&str];

    fn supports_model(&self, model: &str) -> bool {
        self.models().iter().any(|m| *m == model || model.starts_with(m))
    }

    async fn generate_text(
        &self,
        model: &str,
        messages: &[crate::types::LlmMessage],
        opts: GenerateOpts,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<GenerationResponse>;

    /// Embedding surface for the Consensus Engine's `semantic_similarity` rule.
    async fn embed(&self, text: &str, opts: EmbedOpts) -> LlmResult<Vec<f32>>;
}
