//! Reply types: full completions and OpenAI-style streaming chunks.

use std::pin::Pin;

use chrono::Utc;
use futures::Stream;
use serde::Serialize;
use uuid::Uuid;

/// The fixed assistant text returned when the generation backend fails.
///
/// Backend failures are downgraded to this reply instead of being
/// propagated, so a conversation never dies on a transient outage.
pub const DEGRADED_REPLY: &str =
    "I'm sorry, I wasn't able to generate a response just now. Please try again.";

/// A lazy, single-pass sequence of streaming chunks.
///
/// Items are infallible: backend errors are already downgraded to a
/// degraded content chunk before they reach the consumer.
pub type ChunkStream = Pin<Box<dyn Stream<Item = CompletionChunk> + Send>>;

/// The agent's answer to one conversation turn.
pub enum AgentReply {
    /// The full generated text.
    Complete(String),
    /// Incremental fragments, terminated by a stop chunk.
    Stream(ChunkStream),
}

impl std::fmt::Debug for AgentReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            Self::Stream(_) => f.debug_tuple("Stream").finish_non_exhaustive(),
        }
    }
}

/// One server-sent chunk of a streaming completion, in the OpenAI
/// `chat.completion.chunk` shape.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkChoice {
    pub delta: ChunkDelta,
    pub index: u32,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Identity shared by every chunk of one streamed reply.
#[derive(Debug, Clone)]
pub struct StreamIdentity {
    pub id: String,
    pub created: i64,
    pub model: String,
}

impl StreamIdentity {
    /// Mint a fresh `chatcmpl-` identifier stamped with the current time.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", Uuid::new_v4()),
            created: Utc::now().timestamp(),
            model: model.into(),
        }
    }
}

impl CompletionChunk {
    /// A chunk carrying one text fragment at sequence position `index`.
    pub fn content(identity: &StreamIdentity, index: u32, text: impl Into<String>) -> Self {
        Self::build(identity, index, Some(text.into()), None)
    }

    /// The terminal chunk: no content, `finish_reason: "stop"`.
    pub fn stop(identity: &StreamIdentity, index: u32) -> Self {
        Self::build(identity, index, None, Some("stop".to_string()))
    }

    fn build(
        identity: &StreamIdentity,
        index: u32,
        content: Option<String>,
        finish_reason: Option<String>,
    ) -> Self {
        Self {
            id: identity.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: identity.created,
            model: identity.model.clone(),
            choices: vec![ChunkChoice { delta: ChunkDelta { content }, index, finish_reason }],
        }
    }
}
