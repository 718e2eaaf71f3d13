//! Error types shared across the agent crates.

use thiserror::Error;

/// Errors that can occur while serving a conversation turn.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The incoming message list was empty.
    #[error("conversation must contain at least one message")]
    EmptyConversation,

    /// The generation backend failed (network error, bad response, timeout).
    #[error("model error: {0}")]
    Model(String),

    /// Invalid configuration supplied at construction time.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A convenience result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
