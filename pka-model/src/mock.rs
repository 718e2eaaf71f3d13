//! Deterministic mock backend for tests and examples.

use async_trait::async_trait;
use futures::stream;

use pka_core::{AgentError, Llm, LlmRequest, Result, TokenStream};

/// A canned-response [`Llm`] that never touches the network.
///
/// The streaming path yields the configured fragments one by one, so the
/// concatenation of the stream always equals the non-streaming reply for
/// the same input.
///
/// # Example
///
/// ```rust,ignore
/// let llm = MockLlm::with_fragments(vec!["Hel", "lo ", "there"]);
/// assert_eq!(llm.complete(request).await?, "Hello there");
/// ```
pub struct MockLlm {
    fragments: Vec<String>,
    fail: bool,
}

impl MockLlm {
    /// A mock that replies with `reply` (streamed as a single fragment).
    pub fn new(reply: impl Into<String>) -> Self {
        Self { fragments: vec![reply.into()], fail: false }
    }

    /// A mock whose streaming path yields each fragment separately.
    pub fn with_fragments(fragments: Vec<impl Into<String>>) -> Self {
        Self { fragments: fragments.into_iter().map(Into::into).collect(), fail: false }
    }

    /// A mock whose generation calls always fail, for fail-soft tests.
    pub fn failing() -> Self {
        Self { fragments: Vec::new(), fail: true }
    }
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, _request: LlmRequest) -> Result<String> {
        if self.fail {
            return Err(AgentError::Model("mock backend failure".into()));
        }
        Ok(self.fragments.concat())
    }

    async fn complete_stream(&self, _request: LlmRequest) -> Result<TokenStream> {
        if self.fail {
            return Err(AgentError::Model("mock backend failure".into()));
        }
        let items: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(items)))
    }
}
