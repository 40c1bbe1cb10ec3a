use std::time::Instant;

use threadline_llm::StreamChunk;
use threadline_persist::{CompletionMetadata, TurnUpdate};

/// Accumulates relayed chunks and produces the turn's terminal update
///
/// Non-terminal chunk content is always an incremental delta, so the
/// response is plain concatenation. The terminal chunk decides the outcome.
pub struct TurnAccumulator {
    model: String,
    response: String,
    started_at: Instant,
    stream_id: Option<String>,
}

impl TurnAccumulator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            response: String::new(),
            started_at: Instant::now(),
            stream_id: None,
        }
    }

    /// Push a chunk; returns the update to persist once `chunk` is terminal
    pub fn push(&mut self, chunk: &StreamChunk) -> Option<TurnUpdate> {
        if self.stream_id.is_none() {
            self.stream_id = Some(chunk.id.clone());
        }

        if !chunk.finished {
            self.response.push_str(&chunk.content);
            return None;
        }

        if let Some(error) = &chunk.error {
            return Some(TurnUpdate::failed(error.clone()));
        }

        let model = if chunk.model.is_empty() {
            self.model.clone()
        } else {
            chunk.model.clone()
        };

        Some(TurnUpdate::Completed {
            response: std::mem::take(&mut self.response),
            metadata: CompletionMetadata {
                model,
                usage: chunk.usage,
                finish_reason: chunk.finish_reason.clone(),
                response_time_ms: self.started_at.elapsed().as_millis() as u64,
            },
            sources: chunk.sources.clone(),
        })
    }

    /// Terminal error chunk for a stream that ended without one
    pub fn truncated(&self) -> StreamChunk {
        let id = self
            .stream_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        StreamChunk::failed(
            id,
            self.model.clone(),
            "Provider stream ended before completion",
        )
    }

    pub fn response(&self) -> &str {
        &self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_llm::TokenUsage;
    use threadline_persist::TurnStatus;

    #[test]
    fn test_concatenates_deltas_into_completed_update() {
        let mut acc = TurnAccumulator::new("gpt-4");

        assert!(acc.push(&StreamChunk::delta("s", "gpt-4", "2 + 2")).is_none());
        assert!(acc.push(&StreamChunk::delta("s", "gpt-4", " = 4")).is_none());
        let update = acc
            .push(&StreamChunk::finished(
                "s",
                "gpt-4",
                Some(TokenUsage::new(10, 5)),
                Some("stop".to_string()),
                Vec::new(),
            ))
            .unwrap();

        let TurnUpdate::Completed {
            response, metadata, ..
        } = update
        else {
            panic!("expected completed update");
        };
        assert_eq!(response, "2 + 2 = 4");
        assert_eq!(metadata.model, "gpt-4");
        assert_eq!(metadata.usage.unwrap().total_tokens, 15);
        assert_eq!(metadata.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_error_terminal_becomes_failed_update() {
        let mut acc = TurnAccumulator::new("gpt-4");
        acc.push(&StreamChunk::delta("s", "gpt-4", "partial"));

        let update = acc
            .push(&StreamChunk::failed("s", "gpt-4", "connection reset"))
            .unwrap();

        assert_eq!(update.status(), TurnStatus::Failed);
        let TurnUpdate::Failed { metadata } = update else {
            panic!("expected failed update");
        };
        assert_eq!(metadata.error, "connection reset");
    }

    #[test]
    fn test_truncated_reuses_stream_id() {
        let mut acc = TurnAccumulator::new("gpt-4");
        acc.push(&StreamChunk::delta("stream-7", "gpt-4", "Hel"));

        let chunk = acc.truncated();

        assert_eq!(chunk.id, "stream-7");
        assert!(chunk.finished);
        assert!(chunk.is_error());
    }
}
