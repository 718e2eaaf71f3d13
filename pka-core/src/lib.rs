//! # pka-core
//!
//! Shared types for the personal knowledge agent: chat messages, the
//! [`Llm`] generation-backend trait, and the core error enum.
//!
//! The crates above this one compose against these types:
//!
//! - `pka-model` provides concrete [`Llm`] implementations
//! - `pka-agent` orchestrates conversations over an injected `Arc<dyn Llm>`
//! - `pka-server` exposes the agent over HTTP

pub mod error;
pub mod llm;
pub mod message;

pub use error::{AgentError, Result};
pub use llm::{Llm, LlmRequest, TokenStream};
pub use message::{Message, is_supported_role};
