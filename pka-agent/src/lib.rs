//! # pka-agent
//!
//! Chat orchestration for the personal knowledge agent. A
//! [`KnowledgeAgent`] owns one conversation turn end to end: it validates
//! and normalizes the incoming messages, optionally prepends retrieved
//! corpus context, calls the generation backend, and returns either the
//! full text or an OpenAI-style chunk stream.
//!
//! Backend failures never escape this crate as errors: they are
//! downgraded to [`DEGRADED_REPLY`] so the conversation stays alive.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pka_agent::{KnowledgeAgent, TurnOptions};
//!
//! let agent = KnowledgeAgent::builder()
//!     .llm(llm)
//!     .retriever(retriever)
//!     .build()?;
//!
//! let reply = agent.respond(messages, TurnOptions::new("gpt-4o-mini")).await?;
//! ```

pub mod agent;
pub mod reply;

pub use agent::{CONTEXT_PREFIX, KnowledgeAgent, KnowledgeAgentBuilder, TurnOptions};
pub use reply::{AgentReply, ChunkStream, CompletionChunk, DEGRADED_REPLY, StreamIdentity};
