//! The chat orchestrator.
//!
//! One conversation turn runs a fixed state machine: validate the message
//! list, drop unsupported roles, optionally prepend retrieved context,
//! then call the generation backend. Precondition failures are hard
//! errors; generation failures are downgraded to a fixed apology so the
//! conversation survives backend outages.

use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use tracing::{debug, error, warn};

use pka_core::error::{AgentError, Result};
use pka_core::llm::{Llm, LlmRequest, TokenStream};
use pka_core::message::{Message, is_supported_role};
use pka_rag::ContextRetriever;

use crate::reply::{AgentReply, CompletionChunk, DEGRADED_REPLY, StreamIdentity};

/// Prefix marking a system message as injected retrieval context.
pub const CONTEXT_PREFIX: &str = "[CONTEXT] ";

/// Per-turn options carried in from the request boundary.
#[derive(Debug, Clone)]
pub struct TurnOptions {
    /// Model identifier forwarded to the backend and echoed in replies.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask for an incremental reply instead of one full text.
    pub stream: bool,
    /// Retrieve corpus context for the latest user message.
    pub include_context: bool,
    /// Caller-supplied context, used only when `include_context` is off.
    pub context_messages: Vec<Message>,
}

impl TurnOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: 512,
            temperature: 0.1,
            stream: false,
            include_context: false,
            context_messages: Vec::new(),
        }
    }
}

/// Orchestrates one conversation turn against a generation backend,
/// optionally augmented with retrieved corpus context.
///
/// Shares nothing mutable: the backend and retriever are read-only once
/// constructed, so one agent serves any number of concurrent turns.
pub struct KnowledgeAgent {
    llm: Arc<dyn Llm>,
    retriever: Option<Arc<ContextRetriever>>,
    context_top_k: usize,
}

impl KnowledgeAgent {
    pub fn builder() -> KnowledgeAgentBuilder {
        KnowledgeAgentBuilder::default()
    }

    /// Serve one conversation turn.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::EmptyConversation`] if `messages` is empty,
    /// or empties out after unsupported roles are dropped. Generation
    /// failures do NOT error: they produce [`DEGRADED_REPLY`].
    pub async fn respond(&self, messages: Vec<Message>, options: TurnOptions) -> Result<AgentReply> {
        if messages.is_empty() {
            return Err(AgentError::EmptyConversation);
        }

        let messages = self.normalize(messages);
        if messages.is_empty() {
            return Err(AgentError::EmptyConversation);
        }

        let fused = self.fuse_context(messages, &options).await;
        let request = LlmRequest::new(options.model.clone(), fused)
            .with_max_tokens(options.max_tokens)
            .with_temperature(options.temperature);

        if options.stream {
            Ok(AgentReply::Stream(self.stream_reply(request, &options).await))
        } else {
            Ok(AgentReply::Complete(self.complete_reply(request).await))
        }
    }

    /// Drop messages whose role the agent does not understand.
    fn normalize(&self, messages: Vec<Message>) -> Vec<Message> {
        messages
            .into_iter()
            .filter(|m| {
                let keep = is_supported_role(&m.role);
                if !keep {
                    warn!(role = %m.role, "dropping message with unsupported role");
                }
                keep
            })
            .collect()
    }

    /// Prepend context ahead of the conversation.
    ///
    /// `include_context` retrieves from the corpus and takes precedence;
    /// otherwise caller-supplied context messages are used as-is. At most
    /// one of the two paths runs. Retrieval failures degrade to "no
    /// context" rather than failing the turn.
    async fn fuse_context(&self, messages: Vec<Message>, options: &TurnOptions) -> Vec<Message> {
        if options.include_context {
            let Some(retriever) = &self.retriever else {
                debug!("context requested but no retriever configured");
                return messages;
            };
            let Some(query) = messages.iter().rev().find(|m| m.role == "user") else {
                debug!("context requested but no user message present");
                return messages;
            };

            match retriever.retrieve(&query.content, self.context_top_k).await {
                Ok(passages) => {
                    debug!(passages = passages.len(), "fused retrieved context");
                    let mut fused: Vec<Message> = passages
                        .into_iter()
                        .map(|text| Message::system(format!("{CONTEXT_PREFIX}{text}")))
                        .collect();
                    fused.extend(messages);
                    fused
                }
                Err(e) => {
                    warn!(error = %e, "context retrieval failed, continuing without context");
                    messages
                }
            }
        } else if !options.context_messages.is_empty() {
            let mut fused = options.context_messages.clone();
            fused.extend(messages);
            fused
        } else {
            messages
        }
    }

    /// Non-streaming generation; backend failures become the apology text.
    async fn complete_reply(&self, request: LlmRequest) -> String {
        match self.llm.complete(request).await {
            Ok(text) => text,
            Err(e) => {
                error!(backend = self.llm.name(), error = %e, "generation failed");
                DEGRADED_REPLY.to_string()
            }
        }
    }

    /// Streaming generation.
    ///
    /// Fragments are forwarded in arrival order, each wrapped in a chunk
    /// sharing one identity and a running sequence index; the stream ends
    /// with exactly one stop chunk. A backend failure, at connect time or
    /// mid-stream, yields the apology text as a content chunk and then
    /// terminates normally.
    async fn stream_reply(&self, request: LlmRequest, options: &TurnOptions) -> crate::reply::ChunkStream {
        let identity = StreamIdentity::new(options.model.clone());

        let tokens: Option<TokenStream> = match self.llm.complete_stream(request).await {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                error!(backend = self.llm.name(), error = %e, "stream setup failed");
                None
            }
        };
        let backend = self.llm.name().to_string();

        Box::pin(stream! {
            let mut index = 0u32;
            match tokens {
                Some(mut tokens) => {
                    while let Some(item) = tokens.next().await {
                        match item {
                            Ok(text) => {
                                yield CompletionChunk::content(&identity, index, text);
                                index += 1;
                            }
                            Err(e) => {
                                error!(backend = %backend, error = %e, "stream failed mid-flight");
                                yield CompletionChunk::content(&identity, index, DEGRADED_REPLY);
                                index += 1;
                                break;
                            }
                        }
                    }
                }
                None => {
                    yield CompletionChunk::content(&identity, index, DEGRADED_REPLY);
                    index += 1;
                }
            }
            yield CompletionChunk::stop(&identity, index);
        })
    }
}

/// Builder for [`KnowledgeAgent`].
#[derive(Default)]
pub struct KnowledgeAgentBuilder {
    llm: Option<Arc<dyn Llm>>,
    retriever: Option<Arc<ContextRetriever>>,
    context_top_k: Option<usize>,
}

impl KnowledgeAgentBuilder {
    pub fn llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Enable corpus retrieval. Without a retriever, `include_context`
    /// requests degrade to plain generation.
    pub fn retriever(mut self, retriever: Arc<ContextRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Number of passages to retrieve per turn (default 3).
    pub fn context_top_k(mut self, k: usize) -> Self {
        self.context_top_k = Some(k);
        self
    }

    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if no backend was set or
    /// `context_top_k` is zero.
    pub fn build(self) -> Result<KnowledgeAgent> {
        let llm = self
            .llm
            .ok_or_else(|| AgentError::Config("a generation backend is required".to_string()))?;
        let context_top_k = self.context_top_k.unwrap_or(3);
        if context_top_k == 0 {
            return Err(AgentError::Config("context_top_k must be at least 1".to_string()));
        }

        Ok(KnowledgeAgent { llm, retriever: self.retriever, context_top_k })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::StreamExt;

    use pka_model::MockLlm;
    use pka_rag::{EmbeddingProvider, IndexEntry, VectorIndex};

    use super::*;

    /// Records the request it is given and replies with a fixed text.
    struct RecordingLlm {
        last: Mutex<Option<LlmRequest>>,
    }

    impl RecordingLlm {
        fn new() -> Self {
            Self { last: Mutex::new(None) }
        }

        fn last_messages(&self) -> Vec<Message> {
            self.last.lock().unwrap().as_ref().unwrap().messages.clone()
        }
    }

    #[async_trait]
    impl Llm for RecordingLlm {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: LlmRequest) -> pka_core::error::Result<String> {
            *self.last.lock().unwrap() = Some(request);
            Ok("recorded".to_string())
        }

        async fn complete_stream(
            &self,
            request: LlmRequest,
        ) -> pka_core::error::Result<TokenStream> {
            *self.last.lock().unwrap() = Some(request);
            Ok(Box::pin(futures::stream::iter(vec![Ok("recorded".to_string())])))
        }
    }

    struct FixtureEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixtureEmbedder {
        async fn embed(&self, text: &str) -> pka_rag::Result<Vec<f32>> {
            Ok(if text.contains("fox") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn provider_name(&self) -> &str {
            "fixture"
        }
    }

    fn retriever() -> Arc<ContextRetriever> {
        let entry = |text: &str, embedding: Vec<f32>| IndexEntry {
            text: text.to_string(),
            embedding,
            metadata: HashMap::new(),
        };
        let index = VectorIndex::build(vec![
            entry("foxes are canids", vec![0.9, 0.1]),
            entry("dogs are loyal", vec![0.8, 0.2]),
            entry("planets orbit stars", vec![0.0, 1.0]),
        ])
        .unwrap();
        Arc::new(ContextRetriever::new(Arc::new(FixtureEmbedder), index, 1500))
    }

    fn options(model: &str) -> TurnOptions {
        TurnOptions::new(model)
    }

    #[tokio::test]
    async fn empty_conversation_is_a_hard_error() {
        let agent = KnowledgeAgent::builder()
            .llm(Arc::new(MockLlm::new("hello")))
            .build()
            .unwrap();
        let err = agent.respond(Vec::new(), options("m")).await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyConversation));
    }

    #[tokio::test]
    async fn unsupported_roles_are_dropped() {
        let llm = Arc::new(RecordingLlm::new());
        let agent = KnowledgeAgent::builder().llm(llm.clone()).build().unwrap();

        agent
            .respond(
                vec![Message::new("tool", "ignored"), Message::user("hi")],
                options("m"),
            )
            .await
            .unwrap();

        assert_eq!(llm.last_messages(), vec![Message::user("hi")]);
    }

    #[tokio::test]
    async fn all_roles_dropped_is_still_empty_conversation() {
        let agent = KnowledgeAgent::builder()
            .llm(Arc::new(MockLlm::new("hello")))
            .build()
            .unwrap();
        let err = agent
            .respond(vec![Message::new("tool", "x")], options("m"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::EmptyConversation));
    }

    #[tokio::test]
    async fn plain_turn_returns_backend_text_verbatim() {
        let agent = KnowledgeAgent::builder()
            .llm(Arc::new(MockLlm::new("the backend says hi")))
            .build()
            .unwrap();

        match agent.respond(vec![Message::user("hi")], options("m")).await.unwrap() {
            AgentReply::Complete(text) => assert_eq!(text, "the backend says hi"),
            AgentReply::Stream(_) => panic!("expected a complete reply"),
        }
    }

    #[tokio::test]
    async fn retrieved_context_is_prepended_ahead_of_the_conversation() {
        let llm = Arc::new(RecordingLlm::new());
        let agent = KnowledgeAgent::builder()
            .llm(llm.clone())
            .retriever(retriever())
            .context_top_k(2)
            .build()
            .unwrap();

        let mut opts = options("m");
        opts.include_context = true;
        agent
            .respond(vec![Message::user("tell me about the fox")], opts)
            .await
            .unwrap();

        let fused = llm.last_messages();
        assert_eq!(fused.len(), 3);
        assert_eq!(fused[0], Message::system("[CONTEXT] foxes are canids"));
        assert_eq!(fused[1], Message::system("[CONTEXT] dogs are loyal"));
        assert_eq!(fused[2], Message::user("tell me about the fox"));
    }

    #[tokio::test]
    async fn include_context_takes_precedence_over_explicit_context() {
        let llm = Arc::new(RecordingLlm::new());
        let agent = KnowledgeAgent::builder()
            .llm(llm.clone())
            .retriever(retriever())
            .context_top_k(1)
            .build()
            .unwrap();

        let mut opts = options("m");
        opts.include_context = true;
        opts.context_messages = vec![Message::system("explicit context")];
        agent.respond(vec![Message::user("fox?")], opts).await.unwrap();

        let fused = llm.last_messages();
        assert_eq!(fused.len(), 2);
        assert!(fused[0].content.starts_with(CONTEXT_PREFIX));
    }

    #[tokio::test]
    async fn explicit_context_is_used_when_retrieval_is_off() {
        let llm = Arc::new(RecordingLlm::new());
        let agent = KnowledgeAgent::builder().llm(llm.clone()).build().unwrap();

        let mut opts = options("m");
        opts.context_messages = vec![Message::system("pinned note")];
        agent.respond(vec![Message::user("hi")], opts).await.unwrap();

        assert_eq!(
            llm.last_messages(),
            vec![Message::system("pinned note"), Message::user("hi")]
        );
    }

    #[tokio::test]
    async fn context_request_without_retriever_degrades_to_plain_generation() {
        let llm = Arc::new(RecordingLlm::new());
        let agent = KnowledgeAgent::builder().llm(llm.clone()).build().unwrap();

        let mut opts = options("m");
        opts.include_context = true;
        agent.respond(vec![Message::user("hi")], opts).await.unwrap();

        assert_eq!(llm.last_messages(), vec![Message::user("hi")]);
    }

    #[tokio::test]
    async fn generation_failure_produces_the_degraded_reply() {
        let agent = KnowledgeAgent::builder().llm(Arc::new(MockLlm::failing())).build().unwrap();

        match agent.respond(vec![Message::user("hi")], options("m")).await.unwrap() {
            AgentReply::Complete(text) => assert_eq!(text, DEGRADED_REPLY),
            AgentReply::Stream(_) => panic!("expected a complete reply"),
        }
    }

    #[tokio::test]
    async fn three_fragments_stream_as_four_chunks() {
        let agent = KnowledgeAgent::builder()
            .llm(Arc::new(MockLlm::with_fragments(vec!["one ", "two ", "three"])))
            .build()
            .unwrap();

        let mut opts = options("m");
        opts.stream = true;
        let AgentReply::Stream(stream) =
            agent.respond(vec![Message::user("hi")], opts).await.unwrap()
        else {
            panic!("expected a stream");
        };

        let chunks: Vec<CompletionChunk> = stream.collect().await;
        assert_eq!(chunks.len(), 4);

        let assembled: String = chunks[..3]
            .iter()
            .map(|c| c.choices[0].delta.content.clone().unwrap())
            .collect();
        assert_eq!(assembled, "one two three");

        let stop = &chunks[3];
        assert_eq!(stop.choices[0].finish_reason.as_deref(), Some("stop"));
        assert!(stop.choices[0].delta.content.is_none());

        // One identity, running sequence indexes.
        assert!(chunks.iter().all(|c| c.id == chunks[0].id));
        let indexes: Vec<u32> = chunks.iter().map(|c| c.choices[0].index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn failed_stream_setup_degrades_to_apology_plus_stop() {
        let agent = KnowledgeAgent::builder().llm(Arc::new(MockLlm::failing())).build().unwrap();

        let mut opts = options("m");
        opts.stream = true;
        let AgentReply::Stream(stream) =
            agent.respond(vec![Message::user("hi")], opts).await.unwrap()
        else {
            panic!("expected a stream");
        };

        let chunks: Vec<CompletionChunk> = stream.collect().await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].choices[0].delta.content.as_deref(), Some(DEGRADED_REPLY));
        assert_eq!(chunks[1].choices[0].finish_reason.as_deref(), Some("stop"));
    }
}
