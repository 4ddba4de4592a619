//! Tests for the LLM provider adapter contract.

use async_trait::async_trait;
use conclave_llm::{EmbedOpts, GenerateOpts, GenerationResponse, LlmError, LlmMessage, LlmProvider, LlmResult, Usage};
use tokio_util::sync::CancellationToken;

struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn models(&self) -> &[&str] {
        &["stub-model"]
    }

    async fn generate_text(
        &self,
        _model: &str,
        messages: &[LlmMessage],
        _opts: GenerateOpts,
        _cancel: Option<CancellationToken>,
    ) -> LlmResult<GenerationResponse> {
        Ok(GenerationResponse {
            text: format!("echo:{}", messages.last().map(|m| m.content.as_str()).unwrap_or("")),
            usage: Usage::default(),
        })
    }

    async fn embed(&self, text: &str, _opts: EmbedOpts) -> LlmResult<Vec<f32>> {
        if text.is_empty() {
            return Err(LlmError::ProviderError("empty input".into()));
        }
        Ok(vec![text.len() as f32, 0.0, 0.0])
    }
}

#[test]
fn supports_model_matches_prefix() {
    let p = StubProvider;
    assert!(p.supports_model("stub-model"));
    assert!(p.supports_model("stub-model-v2"));
    assert!(!p.supports_model("other"));
}

#[tokio::test]
async fn generate_text_echoes_last_message() {
    let p = StubProvider;
    let messages = vec![LlmMessage::user("hello")];
    let resp = p
        .generate_text("stub-model", &messages, GenerateOpts::default(), None)
        .await
        .unwrap();
    assert_eq!(resp.text, "echo:hello");
}

#[tokio::test]
async fn embed_rejects_empty_input() {
    let p = StubProvider;
    let err = p.embed("", EmbedOpts::default()).await.unwrap_err();
    assert_eq!(err.reason(), "provider_error");
}

#[test]
fn error_reason_classification() {
    assert_eq!(LlmError::AuthFailed("x".into()).reason(), "authentication_failed");
    assert_eq!(
        LlmError::RateLimited { retry_after_ms: 10 }.reason(),
        "rate_limit_exceeded"
    );
    assert_eq!(LlmError::ServiceUnavailable("x".into()).reason(), "service_unavailable");
    assert_eq!(LlmError::RequestFailed("x".into()).reason(), "provider_error");
}
