use futures::{Future, Stream, StreamExt};
use reqwest::RequestBuilder;
use std::pin::Pin;

use crate::buffer_utils::{parse_sse_stream, SseLineParser};
use crate::config::TextMode;
use crate::delta::TextDelta;
use crate::error::{LlmError, Result};
use crate::traits::ChunkStream;
use crate::types::{Source, StreamChunk, TokenUsage};

/// Vendor-neutral event decoded from one SSE frame
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// Text as the vendor reports it (incremental or cumulative)
    Text(String),
    Usage(UsageUpdate),
    FinishReason(String),
    Sources(Vec<Source>),
    /// Vendor error payload received mid-stream
    Failed(String),
    Done,
}

pub type ProviderEventStream = Pin<Box<dyn Stream<Item = Result<ProviderEvent>> + Send>>;

/// Partial usage report; vendors split these across several frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageUpdate {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl UsageUpdate {
    pub fn merge(&mut self, other: UsageUpdate) {
        self.prompt_tokens = other.prompt_tokens.or(self.prompt_tokens);
        self.completion_tokens = other.completion_tokens.or(self.completion_tokens);
        self.total_tokens = other.total_tokens.or(self.total_tokens);
    }

    pub fn into_usage(self) -> Option<TokenUsage> {
        if self.prompt_tokens.is_none() && self.completion_tokens.is_none() && self.total_tokens.is_none() {
            return None;
        }
        let prompt_tokens = self.prompt_tokens.unwrap_or(0);
        let completion_tokens = self.completion_tokens.unwrap_or(0);
        Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: self
                .total_tokens
                .unwrap_or(prompt_tokens + completion_tokens),
        })
    }
}

/// Send the request and, on a 2xx, hand back the decoded SSE events
pub async fn open_sse<P: SseLineParser + 'static>(
    provider: &str,
    request: RequestBuilder,
    parser: P,
) -> Result<ProviderEventStream> {
    let response = request.send().await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            provider: provider.to_string(),
            status,
            message: error_message(&body),
        });
    }

    Ok(parse_sse_stream(response, parser))
}

/// Pulls `error.message` out of a vendor error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let error = v.get("error")?;
            error
                .get("message")
                .and_then(|m| m.as_str())
                .or_else(|| error.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Drives a vendor event stream and yields normalized chunks.
///
/// Guarantees exactly one terminal chunk, always last. Any error (opening the
/// stream, transport, parse, vendor payload) becomes an error terminal chunk
/// and ends the stream. Nothing happens until the returned stream is polled.
/// With `streaming` off the text is coalesced into a single delta.
pub fn normalize_stream<F>(model: String, mode: TextMode, streaming: bool, open: F) -> ChunkStream
where
    F: Future<Output = Result<ProviderEventStream>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let id = uuid::Uuid::new_v4().to_string();
        let mut deltas = TextDelta::new(mode);
        let mut usage = UsageUpdate::default();
        let mut finish_reason: Option<String> = None;
        let mut sources: Vec<Source> = Vec::new();
        let mut coalesced = String::new();

        let mut events = match open.await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(model = %model, error = %e, "Provider stream failed to open");
                yield StreamChunk::failed(&id, &model, e.to_string());
                return;
            }
        };

        while let Some(event) = events.next().await {
            match event {
                Ok(ProviderEvent::Text(text)) => {
                    let delta = deltas.push(&text);
                    if delta.is_empty() {
                        continue;
                    }
                    if streaming {
                        yield StreamChunk::delta(&id, &model, delta);
                    } else {
                        coalesced.push_str(&delta);
                    }
                }
                Ok(ProviderEvent::Usage(update)) => usage.merge(update),
                Ok(ProviderEvent::FinishReason(reason)) => finish_reason = Some(reason),
                Ok(ProviderEvent::Sources(found)) => {
                    for source in found {
                        let duplicate = !source.url.is_empty()
                            && sources.iter().any(|s| s.url == source.url);
                        if !duplicate {
                            sources.push(source);
                        }
                    }
                }
                Ok(ProviderEvent::Failed(message)) => {
                    tracing::warn!(model = %model, error = %message, "Provider reported an error mid-stream");
                    yield StreamChunk::failed(&id, &model, message);
                    return;
                }
                Ok(ProviderEvent::Done) => break,
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "Provider stream failed");
                    yield StreamChunk::failed(&id, &model, e.to_string());
                    return;
                }
            }
        }

        if !coalesced.is_empty() {
            yield StreamChunk::delta(&id, &model, coalesced);
        }

        yield StreamChunk::finished(
            &id,
            &model,
            usage.into_usage(),
            Some(finish_reason.unwrap_or_else(|| "stop".to_string())),
            sources,
        );
    })
}
