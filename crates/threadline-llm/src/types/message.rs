use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};

/// Conversation role, provider-agnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single normalized message handed to an adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Separates the (single) system message from the rest of the conversation.
///
/// More than one system message is rejected.
pub fn split_system(messages: Vec<ChatMessage>) -> Result<(Option<String>, Vec<ChatMessage>)> {
    let mut system = None;
    let mut rest = Vec::with_capacity(messages.len());

    for message in messages {
        if message.role == Role::System {
            if system.is_some() {
                return Err(LlmError::InvalidConversation(
                    "at most one system message is allowed".to_string(),
                ));
            }
            system = Some(message.content);
        } else {
            rest.push(message);
        }
    }

    Ok((system, rest))
}

/// Folds the system message into the first user message, for vendors
/// without a native system role. The system text is prepended with a blank
/// line separator; if there is no user message it becomes one.
pub fn fold_system_into_first_user(messages: Vec<ChatMessage>) -> Result<Vec<ChatMessage>> {
    let (system, mut rest) = split_system(messages)?;

    let Some(system) = system else {
        return Ok(rest);
    };

    match rest.iter_mut().find(|m| m.role == Role::User) {
        Some(first_user) => {
            first_user.content = format!("{}\n\n{}", system, first_user.content);
        }
        None => rest.insert(0, ChatMessage::user(system)),
    }

    Ok(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_split_system_rejects_two_system_messages() {
        let messages = vec![
            ChatMessage::system("a"),
            ChatMessage::system("b"),
            ChatMessage::user("hi"),
        ];
        assert!(matches!(
            split_system(messages),
            Err(LlmError::InvalidConversation(_))
        ));
    }

    #[test]
    fn test_fold_system_into_first_user() {
        let messages = vec![
            ChatMessage::system("Be brief."),
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
        ];

        let folded = fold_system_into_first_user(messages).unwrap();

        assert_eq!(folded.len(), 3);
        assert_eq!(folded[0], ChatMessage::user("Be brief.\n\nfirst"));
        assert_eq!(folded[2], ChatMessage::user("second"));
    }

    #[test]
    fn test_fold_system_without_user_message() {
        let folded = fold_system_into_first_user(vec![ChatMessage::system("only")]).unwrap();
        assert_eq!(folded, vec![ChatMessage::user("only")]);
    }
}
