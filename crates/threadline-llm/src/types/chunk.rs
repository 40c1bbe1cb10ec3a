use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Token accounting reported by the provider on the terminal chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Grounding/citation metadata, normalized across vendors.
///
/// Every field is a plain string; whatever the vendor omits is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Source {
    pub title: String,
    pub url: String,
    pub description: String,
    pub favicon: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    #[default]
    Assistant,
}

/// Unit of streamed assistant output.
///
/// `content` is always an incremental delta. Exactly one chunk per stream has
/// `finished = true` and it is always the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    pub content: String,
    pub finished: bool,
    pub model: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

impl StreamChunk {
    /// Non-terminal chunk carrying a text delta
    pub fn delta(id: impl Into<String>, model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ChunkKind::Assistant,
            content: content.into(),
            finished: false,
            model: model.into(),
            timestamp: Utc::now().timestamp_millis(),
            usage: None,
            finish_reason: None,
            error: None,
            sources: Vec::new(),
        }
    }

    /// Successful terminal chunk
    pub fn finished(
        id: impl Into<String>,
        model: impl Into<String>,
        usage: Option<TokenUsage>,
        finish_reason: Option<String>,
        sources: Vec<Source>,
    ) -> Self {
        Self {
            finished: true,
            usage,
            finish_reason,
            sources,
            ..Self::delta(id, model, String::new())
        }
    }

    /// Terminal chunk describing a failure
    pub fn failed(id: impl Into<String>, model: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            finished: true,
            error: Some(error.into()),
            finish_reason: Some("error".to_string()),
            ..Self::delta(id, model, String::new())
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
