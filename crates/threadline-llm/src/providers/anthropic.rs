// Anthropic Messages API adapter

use serde::Deserialize;
use serde_json::{json, Value};

use crate::buffer_utils::SseLineParser;
use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use crate::providers::{http_client, trim_base};
use crate::streaming::{normalize_stream, open_sse, ProviderEvent, UsageUpdate};
use crate::traits::{ChatAdapter, ChunkStream};
use crate::types::{split_system, ChatMessage};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    http_client: reqwest::Client,
}

impl AnthropicAdapter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http_client: http_client()?,
        })
    }
}

impl ChatAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
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
                .ok_or_else(|| LlmError::MissingCredential("anthropic".to_string()))?;
            let payload = build_messages_payload(messages, &config)?;
            let base = config.base_url.as_deref().unwrap_or(ANTHROPIC_API_BASE);

            let request = client
                .post(format!("{}/v1/messages", trim_base(base)))
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&payload);

            open_sse("anthropic", request, MessagesParser).await
        })
    }
}

/// System prompt travels in its own field, not as a message
fn build_messages_payload(messages: Vec<ChatMessage>, config: &ProviderConfig) -> Result<Value> {
    let (system, rest) = split_system(messages)?;

    let wire_messages: Vec<Value> = rest
        .into_iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect();

    let mut request = json!({
        "model": config.model,
        "messages": wire_messages,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "stream": true,
    });

    if let (Some(system), Some(obj)) = (system, request.as_object_mut()) {
        obj.insert("system".to_string(), json!(system));
    }

    Ok(request)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessagesEvent {
    MessageStart {
        message: MessageInfo,
    },
    ContentBlockDelta {
        delta: BlockDelta,
    },
    MessageDelta {
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<DeltaUsage>,
    },
    MessageStop,
    Error {
        error: ErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageInfo {
    #[serde(default)]
    usage: Option<StartUsage>,
}

#[derive(Debug, Deserialize)]
struct StartUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeltaUsage {
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Parser for Messages API SSE frames. The event type is repeated inside the
/// JSON payload, so `event:` lines are not needed.
struct MessagesParser;

impl SseLineParser for MessagesParser {
    fn parse_data_line(&self, data: &str) -> Result<Vec<ProviderEvent>> {
        let event: MessagesEvent = serde_json::from_str(data)?;

        let events = match event {
            MessagesEvent::MessageStart { message } => match message.usage {
                Some(usage) => vec![ProviderEvent::Usage(UsageUpdate {
                    prompt_tokens: usage.input_tokens,
                    completion_tokens: usage.output_tokens,
                    total_tokens: None,
                })],
                None => vec![],
            },
            MessagesEvent::ContentBlockDelta {
                delta: BlockDelta::TextDelta { text },
            } => vec![ProviderEvent::Text(text)],
            MessagesEvent::ContentBlockDelta { .. } => vec![],
            MessagesEvent::MessageDelta { delta, usage } => {
                let mut events = Vec::new();
                if let Some(reason) = delta.stop_reason {
                    events.push(ProviderEvent::FinishReason(reason));
                }
                if let Some(usage) = usage {
                    events.push(ProviderEvent::Usage(UsageUpdate {
                        completion_tokens: Some(usage.output_tokens),
                        ..Default::default()
                    }));
                }
                events
            }
            MessagesEvent::MessageStop => vec![ProviderEvent::Done],
            MessagesEvent::Error { error } => vec![ProviderEvent::Failed(error.message)],
            MessagesEvent::Other => vec![],
        };

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_moves_system_prompt() {
        let config = ProviderConfig::new("anthropic", "claude-3-sonnet-20240229");
        let messages = vec![
            ChatMessage::system("You are terse."),
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello"),
            ChatMessage::user("Bye"),
        ];

        let payload = build_messages_payload(messages, &config).unwrap();

        assert_eq!(payload["system"], "You are terse.");
        assert_eq!(payload["messages"].as_array().unwrap().len(), 3);
        assert_eq!(payload["max_tokens"], 4096);
    }

    #[test]
    fn test_parse_event_sequence() {
        let parser = MessagesParser;
        let frames = [
            r#"{"type":"message_start","message":{"id":"m","usage":{"input_tokens":12,"output_tokens":1}}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":5}}"#,
            r#"{"type":"message_stop"}"#,
        ];

        let events: Vec<ProviderEvent> = frames
            .iter()
            .flat_map(|f| parser.parse_data_line(f).unwrap())
            .collect();

        assert_eq!(
            events,
            vec![
                ProviderEvent::Usage(UsageUpdate {
                    prompt_tokens: Some(12),
                    completion_tokens: Some(1),
                    total_tokens: None,
                }),
                ProviderEvent::Text("Hi".to_string()),
                ProviderEvent::FinishReason("end_turn".to_string()),
                ProviderEvent::Usage(UsageUpdate {
                    completion_tokens: Some(5),
                    ..Default::default()
                }),
                ProviderEvent::Done,
            ]
        );
    }

    #[test]
    fn test_parse_error_event() {
        let events = MessagesParser
            .parse_data_line(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .unwrap();
        assert_eq!(events, vec![ProviderEvent::Failed("Overloaded".to_string())]);
    }
}
