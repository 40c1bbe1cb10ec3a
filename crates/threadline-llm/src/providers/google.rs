// Google Gemini adapter (generativelanguage REST API, SSE mode)

use serde::Deserialize;
use serde_json::{json, Value};

use crate::buffer_utils::SseLineParser;
use crate::config::ProviderConfig;
use crate::error::{LlmError, Result};
use crate::providers::{http_client, trim_base};
use crate::streaming::{normalize_stream, open_sse, ProviderEvent, UsageUpdate};
use crate::traits::{ChatAdapter, ChunkStream};
use crate::types::{fold_system_into_first_user, ChatMessage, Role, Source};

const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Favicon marker attached to grounding sources
pub const GROUNDING_FAVICON: &str = "📌";

pub struct GoogleAdapter {
    http_client: reqwest::Client,
}

impl GoogleAdapter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http_client: http_client()?,
        })
    }
}

impl ChatAdapter for GoogleAdapter {
    fn name(&self) -> &str {
        "google"
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
                .ok_or_else(|| LlmError::MissingCredential("google".to_string()))?;
            let payload = build_generate_payload(messages, &config)?;
            let base = config.base_url.as_deref().unwrap_or(GOOGLE_API_BASE);

            let request = client
                .post(format!(
                    "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
                    trim_base(base),
                    config.model
                ))
                .header("x-goog-api-key", api_key)
                .json(&payload);

            open_sse("google", request, GenerateContentParser).await
        })
    }
}

/// Gemini has no system role: the system prompt is folded into the first
/// user turn and `assistant` becomes `model`.
fn build_generate_payload(messages: Vec<ChatMessage>, config: &ProviderConfig) -> Result<Value> {
    let contents: Vec<Value> = fold_system_into_first_user(messages)?
        .into_iter()
        .map(|m| {
            let role = match m.role {
                Role::Assistant => "model",
                _ => "user",
            };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();

    let mut request = json!({
        "contents": contents,
        "generationConfig": {
            "temperature": config.temperature,
            "maxOutputTokens": config.max_tokens,
        },
    });

    if config.tools.web_grounding {
        if let Some(obj) = request.as_object_mut() {
            obj.insert("tools".to_string(), json!([{ "googleSearch": {} }]));
        }
    }

    Ok(request)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    total_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

struct GenerateContentParser;

impl SseLineParser for GenerateContentParser {
    fn parse_data_line(&self, data: &str) -> Result<Vec<ProviderEvent>> {
        let response: GenerateContentResponse = serde_json::from_str(data)?;
        let mut events = Vec::new();

        if let Some(error) = response.error {
            events.push(ProviderEvent::Failed(error.message));
            return Ok(events);
        }

        if let Some(candidate) = response.candidates.into_iter().next() {
            let text: String = candidate
                .content
                .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
                .unwrap_or_default();
            if !text.is_empty() {
                events.push(ProviderEvent::Text(text));
            }

            if let Some(grounding) = candidate.grounding_metadata {
                let sources: Vec<Source> = grounding
                    .grounding_chunks
                    .into_iter()
                    .filter_map(|chunk| chunk.web)
                    .map(|web| Source {
                        title: web.title.unwrap_or_default(),
                        url: web.uri.unwrap_or_default(),
                        description: String::new(),
                        favicon: GROUNDING_FAVICON.to_string(),
                    })
                    .collect();
                if !sources.is_empty() {
                    events.push(ProviderEvent::Sources(sources));
                }
            }

            if let Some(reason) = candidate.finish_reason {
                events.push(ProviderEvent::FinishReason(reason.to_ascii_lowercase()));
            }
        }

        if let Some(usage) = response.usage_metadata {
            events.push(ProviderEvent::Usage(UsageUpdate {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            }));
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_folds_system_and_maps_roles() {
        let config = ProviderConfig::new("google", "gemini-2.5-flash")
            .max_tokens(8192)
            .web_grounding(true);
        let messages = vec![
            ChatMessage::system("Cite sources."),
            ChatMessage::user("Who won?"),
            ChatMessage::assistant("Team A."),
            ChatMessage::user("When?"),
        ];

        let payload = build_generate_payload(messages, &config).unwrap();
        let contents = payload["contents"].as_array().unwrap();

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["parts"][0]["text"], "Cite sources.\n\nWho won?");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], 8192);
        assert!(payload["tools"][0].get("googleSearch").is_some());
    }

    #[test]
    fn test_payload_without_grounding_has_no_tools() {
        let config = ProviderConfig::new("google", "gemini-2.5-flash");
        let payload = build_generate_payload(vec![ChatMessage::user("hi")], &config).unwrap();
        assert!(payload.get("tools").is_none());
    }

    #[test]
    fn test_parse_final_frame_with_grounding() {
        let frame = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Team A won."}], "role": "model"},
                "finishReason": "STOP",
                "groundingMetadata": {"groundingChunks": [
                    {"web": {"uri": "https://news.example/a", "title": "news.example"}},
                    {"web": {"uri": "https://other.example/b"}}
                ]}
            }],
            "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 4, "totalTokenCount": 12}
        }"#;

        let events = GenerateContentParser.parse_data_line(frame).unwrap();

        assert_eq!(events[0], ProviderEvent::Text("Team A won.".to_string()));
        match &events[1] {
            ProviderEvent::Sources(sources) => {
                assert_eq!(sources.len(), 2);
                assert_eq!(sources[0].title, "news.example");
                assert_eq!(sources[1].title, "");
                assert_eq!(sources[1].favicon, GROUNDING_FAVICON);
            }
            other => panic!("expected sources, got {:?}", other),
        }
        assert_eq!(events[2], ProviderEvent::FinishReason("stop".to_string()));
        assert_eq!(
            events[3],
            ProviderEvent::Usage(UsageUpdate {
                prompt_tokens: Some(8),
                completion_tokens: Some(4),
                total_tokens: Some(12),
            })
        );
    }
}
