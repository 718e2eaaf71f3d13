//! The generation-backend trait.
//!
//! The agent depends only on this contract, never on a specific provider.
//! Implementations live in `pka-model`; tests inject deterministic doubles.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;
use crate::message::Message;

/// A request to a generation backend.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model identifier understood by the backend.
    pub model: String,
    /// Ordered conversation, context messages included.
    pub messages: Vec<Message>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl LlmRequest {
    /// Create a request with the given model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self { model: model.into(), messages, max_tokens: 512, temperature: 0.1 }
    }

    /// Set the max-token bound.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A single-pass stream of text fragments from a generation backend.
///
/// Fragments arrive in generation order. Dropping the stream cancels the
/// underlying request and releases the backend connection.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A generation backend.
///
/// Both operations suspend on network I/O and should be treated as
/// cancelable by callers. Implementations must be safe to share across
/// concurrent requests.
#[async_trait]
pub trait Llm: Send + Sync {
    /// A short name identifying the backend (usually the model name).
    fn name(&self) -> &str;

    /// Generate one full completion for the request.
    async fn complete(&self, request: LlmRequest) -> Result<String>;

    /// Generate a completion as a stream of incremental text fragments.
    ///
    /// The stream ends when the backend signals completion; it carries no
    /// explicit terminal marker of its own (the agent layer adds one).
    async fn complete_stream(&self, request: LlmRequest) -> Result<TokenStream>;
}
