use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use threadline_llm::{Source, TokenUsage};

use super::Thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Processing,
    Completed,
    Failed,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Processing => "processing",
            TurnStatus::Completed => "completed",
            TurnStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnStatus::Processing)
    }
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata stored on a completed turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMetadata {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    pub response_time_ms: u64,
}

/// Metadata stored on a failed turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureMetadata {
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnMetadata {
    Completed(CompletionMetadata),
    Failed(FailureMetadata),
}

/// Database-agnostic turn model: one prompt/response exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub thread_id: String,
    pub user_prompt: String,
    pub llm_response: Option<String>,
    pub status: TurnStatus,
    pub llm_model: String,
    pub metadata: Option<TurnMetadata>,
    #[serde(default)]
    pub sources: Vec<Source>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Turn {
    /// Fresh turn in `processing` status
    pub fn processing(
        thread_id: impl Into<String>,
        user_prompt: impl Into<String>,
        llm_model: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            user_prompt: user_prompt.into(),
            llm_response: None,
            status: TurnStatus::Processing,
            llm_model: llm_model.into(),
            metadata: None,
            sources: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a terminal update in place
    pub fn apply(&mut self, update: TurnUpdate, at: DateTime<Utc>) {
        self.status = update.status();
        self.updated_at = at;
        match update {
            TurnUpdate::Completed {
                response,
                metadata,
                sources,
            } => {
                self.llm_response = Some(response);
                self.metadata = Some(TurnMetadata::Completed(metadata));
                self.sources = sources;
            }
            TurnUpdate::Failed { metadata } => {
                self.metadata = Some(TurnMetadata::Failed(metadata));
            }
        }
    }

    /// Response text, if present and non-empty
    pub fn response(&self) -> Option<&str> {
        self.llm_response.as_deref().filter(|r| !r.is_empty())
    }
}

/// Terminal state written by a conditional status transition
#[derive(Debug, Clone, PartialEq)]
pub enum TurnUpdate {
    Completed {
        response: String,
        metadata: CompletionMetadata,
        sources: Vec<Source>,
    },
    Failed {
        metadata: FailureMetadata,
    },
}

impl TurnUpdate {
    pub fn failed(error: impl Into<String>) -> Self {
        TurnUpdate::Failed {
            metadata: FailureMetadata {
                error: error.into(),
                failed_at: Utc::now(),
            },
        }
    }

    pub fn status(&self) -> TurnStatus {
        match self {
            TurnUpdate::Completed { .. } => TurnStatus::Completed,
            TurnUpdate::Failed { .. } => TurnStatus::Failed,
        }
    }
}

/// Input for the atomic find-or-create-thread + create-turn operation
#[derive(Debug, Clone)]
pub struct StartTurn {
    pub user_id: String,
    /// Reused when it names a thread owned by `user_id`; otherwise used as the
    /// id of the new thread
    pub thread_id: Option<String>,
    /// Title for a newly created thread
    pub title: String,
    pub prompt: String,
    pub llm_model: String,
}

#[derive(Debug, Clone)]
pub struct StartedTurn {
    pub thread: Thread,
    pub turn: Turn,
    pub thread_created: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_metadata_wire_shape() {
        let metadata = TurnMetadata::Completed(CompletionMetadata {
            model: "gemini-2.5-flash".to_string(),
            usage: Some(TokenUsage::new(10, 5)),
            finish_reason: Some("stop".to_string()),
            response_time_ms: 1200,
        });

        let value = serde_json::to_value(&metadata).unwrap();

        assert_eq!(value["model"], "gemini-2.5-flash");
        assert_eq!(value["usage"]["promptTokens"], 10);
        assert_eq!(value["finishReason"], "stop");
        assert_eq!(value["responseTimeMs"], 1200);
    }

    #[test]
    fn test_metadata_round_trips_both_shapes() {
        let failed = TurnUpdate::failed("upstream closed");
        let TurnUpdate::Failed { metadata } = failed else {
            panic!("expected failed update");
        };
        let json = serde_json::to_string(&TurnMetadata::Failed(metadata.clone())).unwrap();

        let parsed: TurnMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TurnMetadata::Failed(metadata));

        let completed: TurnMetadata =
            serde_json::from_str(r#"{"model":"m","responseTimeMs":3}"#).unwrap();
        assert!(matches!(completed, TurnMetadata::Completed(_)));
    }

    #[test]
    fn test_apply_failed_keeps_response_empty() {
        let mut turn = Turn::processing("t1", "hi", "gpt-4");
        turn.apply(TurnUpdate::failed("boom"), Utc::now());

        assert_eq!(turn.status, TurnStatus::Failed);
        assert!(turn.llm_response.is_none());
        assert!(turn.response().is_none());
    }
}
