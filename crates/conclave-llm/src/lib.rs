//! LLM provider adapter (spec §6): `generate_text` + `embed`, treated as opaque by
//! the rest of the core.

pub mod anthropic;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use provider::{EmbedOpts, GenerateOpts, GenerationResponse, LlmError, LlmProvider, LlmResult, Usage};
pub use types::{LlmMessage, Role};
