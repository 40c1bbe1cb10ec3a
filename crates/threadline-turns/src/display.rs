use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use threadline_llm::Source;
use threadline_persist::{Thread, Turn, TurnStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayKind {
    User,
    Assistant,
}

/// Flat, render-ready message derived from a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DisplayKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub finished: bool,
    pub model: String,
    pub sources: Vec<Source>,
}

impl DisplayMessage {
    /// One user message per turn, followed by the assistant message when the
    /// turn has a response
    pub fn from_turn(turn: &Turn) -> Vec<DisplayMessage> {
        let mut messages = vec![DisplayMessage {
            id: format!("{}:user", turn.id),
            kind: DisplayKind::User,
            content: turn.user_prompt.clone(),
            timestamp: turn.created_at,
            finished: true,
            model: turn.llm_model.clone(),
            sources: Vec::new(),
        }];

        if let Some(response) = turn.response() {
            messages.push(DisplayMessage {
                id: format!("{}:assistant", turn.id),
                kind: DisplayKind::Assistant,
                content: response.to_string(),
                timestamp: turn.created_at,
                finished: turn.status == TurnStatus::Completed,
                model: turn.llm_model.clone(),
                sources: turn.sources.clone(),
            });
        }

        messages
    }
}

/// A thread with its turns flattened for display
#[derive(Debug, Clone)]
pub struct ThreadTurns {
    pub thread: Thread,
    pub messages: Vec<DisplayMessage>,
}

impl ThreadTurns {
    pub fn new(thread: Thread, turns: &[Turn]) -> Self {
        Self {
            thread,
            messages: turns.iter().flat_map(DisplayMessage::from_turn).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_persist::{CompletionMetadata, TurnUpdate};

    #[test]
    fn test_turn_without_response_yields_only_user_message() {
        let turn = Turn::processing("thread", "hello", "gemini-2.5-flash");

        let messages = DisplayMessage::from_turn(&turn);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind, DisplayKind::User);
        assert_eq!(messages[0].id, format!("{}:user", turn.id));
    }

    #[test]
    fn test_completed_turn_carries_sources_on_assistant_message() {
        let mut turn = Turn::processing("thread", "news?", "gemini-2.5-flash");
        let source = Source {
            title: "Example".to_string(),
            url: "https://example.com".to_string(),
            ..Default::default()
        };
        turn.apply(
            TurnUpdate::Completed {
                response: "Here.".to_string(),
                metadata: CompletionMetadata {
                    model: "gemini-2.5-flash".to_string(),
                    usage: None,
                    finish_reason: Some("stop".to_string()),
                    response_time_ms: 10,
                },
                sources: vec![source.clone()],
            },
            Utc::now(),
        );

        let messages = DisplayMessage::from_turn(&turn);

        assert_eq!(messages.len(), 2);
        assert!(messages[0].sources.is_empty());
        assert_eq!(messages[1].kind, DisplayKind::Assistant);
        assert!(messages[1].finished);
        assert_eq!(messages[1].sources, vec![source]);

        let json = serde_json::to_value(&messages[1]).unwrap();
        assert_eq!(json["type"], "assistant");
    }
}
