//! Chat message types.

use serde::{Deserialize, Serialize};

/// The roles a message may carry after normalization.
pub const SUPPORTED_ROLES: [&str; 3] = ["system", "user", "assistant"];

/// Returns true if `role` is one of the roles the agent understands.
pub fn is_supported_role(role: &str) -> bool {
    SUPPORTED_ROLES.contains(&role)
}

/// A single conversation message.
///
/// The role is kept as a plain string to match the OpenAI wire format;
/// the agent drops messages whose role is not in [`SUPPORTED_ROLES`]
/// during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// One of `system`, `user`, or `assistant`.
    pub role: String,
    /// The message text.
    pub content: String,
}

impl Message {
    /// Create a message with an arbitrary role.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: role.into(), content: content.into() }
    }

    /// Create a system-role message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// Create a user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant-role message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_roles_cover_chat_roles() {
        assert!(is_supported_role("system"));
        assert!(is_supported_role("user"));
        assert!(is_supported_role("assistant"));
        assert!(!is_supported_role("tool"));
        assert!(!is_supported_role(""));
    }

    #[test]
    fn constructors_set_roles() {
        assert_eq!(Message::user("hi").role, "user");
        assert_eq!(Message::system("ctx").role, "system");
        assert_eq!(Message::assistant("ok").role, "assistant");
    }
}
