// Self-hosted models behind an OpenAI-compatible endpoint (llama.cpp, vLLM, ...)

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::providers::openai::{build_chat_payload, ChatCompletionsParser};
use crate::providers::{http_client, trim_base};
use crate::streaming::{normalize_stream, open_sse};
use crate::traits::{ChatAdapter, ChunkStream};
use crate::types::ChatMessage;

const LOCAL_API_BASE: &str = "http://localhost:8000";

pub struct LocalAdapter {
    http_client: reqwest::Client,
}

impl LocalAdapter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http_client: http_client()?,
        })
    }
}

impl ChatAdapter for LocalAdapter {
    fn name(&self) -> &str {
        "local"
    }

    fn stream_chat(&self, messages: Vec<ChatMessage>, config: ProviderConfig) -> ChunkStream {
        let client = self.http_client.clone();
        let model = config.model.clone();
        let mode = config.text_mode;
        let streaming = config.streaming_enabled;

        normalize_stream(model, mode, streaming, async move {
            let payload = build_chat_payload(messages, &config, false)?;
            let base = config.base_url.as_deref().unwrap_or(LOCAL_API_BASE);

            let mut request = client
                .post(format!("{}/v1/chat/completions", trim_base(base)))
                .json(&payload);
            if let Some(api_key) = &config.api_key {
                request = request.bearer_auth(api_key);
            }

            open_sse("local", request, ChatCompletionsParser).await
        })
    }
}
