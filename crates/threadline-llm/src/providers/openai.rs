// OpenAI chat-completions adapter (HTTP direct, no SDK)

use serde::Deserialize;
use serde_json::{json, Value};

use crate::buffer_utils::SseLineParser;
use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use crate::providers::{http_client, trim_base};
use crate::streaming::{normalize_stream, open_sse, ProviderEvent, UsageUpdate};
use crate::traits::{ChatAdapter, ChunkStream};
use crate::types::{split_system, ChatMessage};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAIAdapter {
    http_client: reqwest::Client,
}

impl OpenAIAdapter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http_client: http_client()?,
        })
    }
}

impl ChatAdapter for OpenAIAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn stream_chat(&self, messages: Vec<ChatMessage>, config: ProviderConfig) -> ChunkStream {
        let client = self.http_client.clone();
        let model = config.model.clone();
        let mode = config.text_mode;
        let streaming = config.streaming_enabled;

        normalize_stream(model, mode, streaming, async move {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| LlmError::MissingCredential("openai".to_string()))?;
            let payload = build_chat_payload(messages, &config, true)?;
            let base = config.base_url.as_deref().unwrap_or(OPENAI_API_BASE);

            let request = client
                .post(format!("{}/chat/completions", trim_base(base)))
                .bearer_auth(api_key)
                .json(&payload);

            open_sse("openai", request, ChatCompletionsParser).await
        })
    }
}

/// Build a streaming chat-completions payload.
///
/// Shared with OpenAI-compatible local servers, which may not understand
/// `stream_options`.
pub(crate) fn build_chat_payload(
    messages: Vec<ChatMessage>,
    config: &ProviderConfig,
    include_usage: bool,
) -> Result<Value> {
    let (system, rest) = split_system(messages)?;

    let mut wire_messages = Vec::with_capacity(rest.len() + 1);
    if let Some(system) = system {
        wire_messages.push(json!({ "role": "system", "content": system }));
    }
    wire_messages.extend(
        rest.into_iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content })),
    );

    let mut request = serde_json::Map::new();
    request.insert("model".to_string(), json!(config.model));
    request.insert("messages".to_string(), Value::Array(wire_messages));
    request.insert("stream".to_string(), json!(true));

    if include_usage {
        request.insert("stream_options".to_string(), json!({ "include_usage": true }));
    }

    // o1 and gpt-5 models reject temperature and use max_completion_tokens
    let is_reasoning_model = config.model.starts_with("o1") || config.model.starts_with("gpt-5");
    if !is_reasoning_model {
        request.insert("temperature".to_string(), json!(config.temperature));
    }
    let token_field = if is_reasoning_model {
        "max_completion_tokens"
    } else {
        "max_tokens"
    };
    request.insert(token_field.to_string(), json!(config.max_tokens));

    Ok(Value::Object(request))
}

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    message: String,
}

/// Parser for `chat/completions` SSE frames
pub(crate) struct ChatCompletionsParser;

impl SseLineParser for ChatCompletionsParser {
    fn parse_data_line(&self, data: &str) -> Result<Vec<ProviderEvent>> {
        let chunk: ChatStreamChunk = serde_json::from_str(data)?;
        let mut events = Vec::new();

        if let Some(error) = chunk.error {
            events.push(ProviderEvent::Failed(error.message));
            return Ok(events);
        }

        if let Some(choice) = chunk.choices.first() {
            if let Some(content) = choice.delta.as_ref().and_then(|d| d.content.as_ref()) {
                if !content.is_empty() {
                    events.push(ProviderEvent::Text(content.clone()));
                }
            }
            if let Some(reason) = &choice.finish_reason {
                events.push(ProviderEvent::FinishReason(reason.clone()));
            }
        }

        if let Some(usage) = chunk.usage {
            events.push(ProviderEvent::Usage(UsageUpdate {
                prompt_tokens: Some(usage.prompt_tokens),
                completion_tokens: Some(usage.completion_tokens),
                total_tokens: Some(usage.total_tokens),
            }));
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_for_chat_model() {
        let config = ProviderConfig::new("openai", "gpt-4-turbo-preview")
            .temperature(0.2)
            .max_tokens(100);
        let messages = vec![ChatMessage::system("Be brief."), ChatMessage::user("Hi")];

        let payload = build_chat_payload(messages, &config, true).unwrap();

        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "Hi");
        assert_eq!(payload["max_tokens"], 100);
        assert!(payload.get("temperature").is_some());
        assert_eq!(payload["stream_options"]["include_usage"], true);
    }

    #[test]
    fn test_payload_for_reasoning_model() {
        let config = ProviderConfig::new("openai", "o1-mini").max_tokens(256);

        let payload = build_chat_payload(vec![ChatMessage::user("Hi")], &config, false).unwrap();

        assert!(payload.get("temperature").is_none());
        assert!(payload.get("max_tokens").is_none());
        assert_eq!(payload["max_completion_tokens"], 256);
        assert!(payload.get("stream_options").is_none());
    }

    #[test]
    fn test_parse_content_and_finish_reason() {
        let parser = ChatCompletionsParser;

        let events = parser
            .parse_data_line(r#"{"id":"x","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#)
            .unwrap();
        assert_eq!(events, vec![ProviderEvent::Text("Hello".to_string())]);

        let events = parser
            .parse_data_line(r#"{"id":"x","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#)
            .unwrap();
        assert_eq!(events, vec![ProviderEvent::FinishReason("stop".to_string())]);
    }

    #[test]
    fn test_parse_usage_only_frame() {
        let events = ChatCompletionsParser
            .parse_data_line(r#"{"choices":[],"usage":{"prompt_tokens":9,"completion_tokens":2,"total_tokens":11}}"#)
            .unwrap();

        assert_eq!(
            events,
            vec![ProviderEvent::Usage(UsageUpdate {
                prompt_tokens: Some(9),
                completion_tokens: Some(2),
                total_tokens: Some(11),
            })]
        );
    }

    #[test]
    fn test_parse_malformed_frame_is_error() {
        assert!(ChatCompletionsParser.parse_data_line("{not json").is_err());
    }
}
