//! Anthropic Claude provider: implements `generate_text` over the Messages API's SSE
//! stream (accumulated to a final string) and `embed` against a configurable
//! embeddings endpoint, per the single-call-surface contract in spec §6.

use crate::provider::{EmbedOpts, GenerateOpts, GenerationResponse, LlmError, LlmProvider, LlmResult, Usage};
use crate::types::{LlmMessage, Role};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    embeddings_url: Option<String>,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
            embeddings_url: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Anthropic has no embeddings endpoint; point this at a Voyage-compatible one
    /// (the embeddings provider Anthropic itself recommends) to enable
    /// `semantic_similarity` consensus.
    pub fn with_embeddings_url(mut self, url: impl Into<String>) -> Self {
        self.embeddings_url = Some(url.into());
        self
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn models(&self) -> &[&str] {
        &[
            "claude-opus-4-6-20250929",
            "claude-opus-4-6",
            "claude-haiku-4-5-20251001",
        ]
    }

    async fn generate_text(
        &self,
        model: &str,
        messages: &[LlmMessage],
        opts: GenerateOpts,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<GenerationResponse> {
        let body = AnthropicRequest {
            model: model.to_string(),
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| AnthropicMessage {
                    role: match m.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                        Role::System => unreachable!(),
                    }
                    .to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: opts.max_tokens.unwrap_or(8192),
            stream: true,
            system: opts.system.or_else(|| {
                messages
                    .iter()
                    .find(|m| m.role == Role::System)
                    .map(|m| m.content.clone())
            }),
            temperature: opts.temperature,
        };

        debug!("anthropic request: model={}", body.model);

        let request = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send();

        let response = if let Some(token) = &cancel {
            tokio::select! {
                r = request => r.map_err(|e| LlmError::RequestFailed(e.to_string()))?,
                _ = token.cancelled() => return Err(LlmError::Cancelled),
            }
        } else {
            request.await.map_err(|e| LlmError::RequestFailed(e.to_string()))?
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("anthropic error {}: {}", status, error_text);
            return Err(match status.as_u16() {
                401 => LlmError::AuthFailed(error_text),
                429 => LlmError::RateLimited { retry_after_ms: 60_000 },
                503 => LlmError::ServiceUnavailable(error_text),
                _ => LlmError::RequestFailed(format!("{status}: {error_text}")),
            });
        }

        accumulate_sse(response.bytes_stream(), cancel).await
    }

    async fn embed(&self, text: &str, opts: EmbedOpts) -> LlmResult<Vec<f32>> {
        let url = self
            .embeddings_url
            .clone()
            .ok_or_else(|| LlmError::ProviderError("no embeddings endpoint configured".into()))?;

        let body = EmbedRequest {
            input: vec![text.to_string()],
            model: opts.model.unwrap_or_else(|| "voyage-3".to_string()),
        };

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::RequestFailed(format!(
                "embeddings endpoint returned {}",
                response.status()
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ProviderError(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::ProviderError("empty embedding response".into()))
    }
}

async fn accumulate_sse(
    bytes_stream: impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send,
    cancel: Option<CancellationToken>,
) -> LlmResult<GenerationResponse> {
    tokio::pin!(bytes_stream);
    let mut buffer = String::new();
    let mut text = String::new();
    let mut usage = Usage::default();

    loop {
        let next = if let Some(token) = &cancel {
            tokio::select! {
                n = bytes_stream.next() => n,
                _ = token.cancelled() => return Err(LlmError::Cancelled),
            }
        } else {
            bytes_stream.next().await
        };

        let Some(chunk_result) = next else { break };
        let chunk = chunk_result.map_err(|e| LlmError::StreamError(e.to_string()))?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(event_end) = buffer.find("\n\n") {
            let event_str = buffer[..event_end].to_string();
            buffer = buffer[event_end + 2..].to_string();

            let mut event_type = String::new();
            let mut event_data = String::new();
            for line in event_str.lines() {
                if let Some(rest) = line.strip_prefix("event: ") {
                    event_type = rest.to_string();
                } else if let Some(rest) = line.strip_prefix("data: ") {
                    event_data = rest.to_string();
                }
            }
            if event_data.is_empty() {
                continue;
            }

            match event_type.as_str() {
                "content_block_delta" => {
                    if let Ok(data) = serde_json::from_str::<ContentBlockDelta>(&event_data) {
                        if let DeltaType::TextDelta { text: t } = data.delta {
                            text.push_str(&t);
                        }
                    }
                }
                "message_delta" => {
                    if let Ok(data) = serde_json::from_str::<MessageDelta>(&event_data) {
                        if let Some(u) = data.usage {
                            usage.output_tokens = u.output_tokens;
                        }
                    }
                }
                "error" => {
                    if let Ok(data) = serde_json::from_str::<ErrorEvent>(&event_data) {
                        return Err(LlmError::StreamError(data.error.message));
                    }
                }
                _ => {}
            }
        }
    }

    Ok(GenerationResponse { text, usage })
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    delta: DeltaType,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DeltaType {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct MessageDelta {
    usage: Option<UsageWire>,
}

#[derive(Deserialize)]
struct UsageWire {
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}
