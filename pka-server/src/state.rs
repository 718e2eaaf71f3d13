//! Shared per-process state.

use std::sync::Arc;

use pka_agent::KnowledgeAgent;

/// State shared by all request handlers.
///
/// Everything here is read-only after startup, so cloning per request is
/// cheap and lock-free.
#[derive(Clone)]
pub struct AppState {
    /// The chat orchestrator.
    pub agent: Arc<KnowledgeAgent>,
    /// Model identifier used when a request does not name one.
    pub model: String,
}

impl AppState {
    pub fn new(agent: Arc<KnowledgeAgent>, model: impl Into<String>) -> Self {
        Self { agent, model: model.into() }
    }
}
