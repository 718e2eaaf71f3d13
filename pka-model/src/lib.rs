//! # pka-model
//!
//! Generation backends implementing the [`pka_core::Llm`] trait.
//!
//! - [`OpenAIClient`] — OpenAI and OpenAI-compatible chat-completion APIs
//!   (non-streaming JSON and SSE streaming)
//! - [`MockLlm`] — deterministic backend for tests and examples, no network
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use pka_model::{OpenAIClient, OpenAIConfig};
//!
//! let client = OpenAIClient::new(OpenAIConfig::new(
//!     std::env::var("OPENAI_API_KEY").unwrap(),
//! ))?;
//! ```

pub mod mock;
pub mod openai;

pub use mock::MockLlm;
pub use openai::{OpenAIClient, OpenAIConfig};
