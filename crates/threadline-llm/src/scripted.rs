//! Deterministic adapter for tests: replays a script through the same
//! normalization path the HTTP adapters use.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::LlmError;
use crate::streaming::{normalize_stream, ProviderEvent, ProviderEventStream, UsageUpdate};
use crate::traits::{ChatAdapter, ChunkStream};
use crate::types::{ChatMessage, Source};

#[derive(Debug, Clone)]
pub enum ScriptStep {
    Text(String),
    Usage { prompt: u32, completion: u32 },
    Sources(Vec<Source>),
    Finish(String),
    /// Transport-level failure
    Fail(String),
    /// Sleep before the next step
    Delay(Duration),
    /// Never produce another event
    Hang,
}

pub struct ScriptedAdapter {
    name: String,
    steps: Vec<ScriptStep>,
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedAdapter {
    pub fn new(name: impl Into<String>, steps: Vec<ScriptStep>) -> Self {
        Self {
            name: name.into(),
            steps,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Streams the given text pieces then finishes with "stop"
    pub fn replying(name: impl Into<String>, pieces: &[&str]) -> Self {
        let mut steps: Vec<ScriptStep> = pieces
            .iter()
            .map(|p| ScriptStep::Text(p.to_string()))
            .collect();
        steps.push(ScriptStep::Finish("stop".to_string()));
        Self::new(name, steps)
    }

    /// Message lists received so far, one entry per `stream_chat` call
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ChatAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream_chat(&self, messages: Vec<ChatMessage>, config: ProviderConfig) -> ChunkStream {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages);
        }

        let steps = self.steps.clone();
        let events: ProviderEventStream = Box::pin(async_stream::stream! {
            for step in steps {
                match step {
                    ScriptStep::Text(text) => {
                        yield Ok(ProviderEvent::Text(text));
                    }
                    ScriptStep::Usage { prompt, completion } => {
                        yield Ok(ProviderEvent::Usage(UsageUpdate {
                            prompt_tokens: Some(prompt),
                            completion_tokens: Some(completion),
                            total_tokens: None,
                        }));
                    }
                    ScriptStep::Sources(sources) => {
                        yield Ok(ProviderEvent::Sources(sources));
                    }
                    ScriptStep::Finish(reason) => {
                        yield Ok(ProviderEvent::FinishReason(reason));
                        yield Ok(ProviderEvent::Done);
                    }
                    ScriptStep::Fail(message) => {
                        yield Err(LlmError::Stream(message));
                    }
                    ScriptStep::Delay(duration) => tokio::time::sleep(duration).await,
                    ScriptStep::Hang => futures::future::pending::<()>().await,
                }
            }
        });

        normalize_stream(
            config.model.clone(),
            config.text_mode,
            config.streaming_enabled,
            async move { Ok::<_, LlmError>(events) },
        )
    }
}
