use futures::StreamExt;
use mockito::Matcher;
use threadline_llm::{
    AnthropicAdapter, ChatAdapter, ChatMessage, GoogleAdapter, LocalAdapter, OpenAIAdapter,
    ProviderConfig, StreamChunk, TextMode,
};

fn sse(frames: &[&str]) -> String {
    frames
        .iter()
        .map(|f| format!("data: {}\n\n", f))
        .collect()
}

async fn run(adapter: &dyn ChatAdapter, messages: Vec<ChatMessage>, config: ProviderConfig) -> Vec<StreamChunk> {
    adapter.stream_chat(messages, config).collect().await
}

fn text_of(chunks: &[StreamChunk]) -> String {
    chunks
        .iter()
        .filter(|c| !c.finished)
        .map(|c| c.content.as_str())
        .collect()
}

fn assert_single_terminal_last(chunks: &[StreamChunk]) {
    assert!(!chunks.is_empty());
    assert_eq!(chunks.iter().filter(|c| c.finished).count(), 1);
    assert!(chunks.last().unwrap().finished);
}

#[tokio::test]
async fn test_openai_streams_deltas_and_usage() {
    let mut server = mockito::Server::new_async().await;
    let body = sse(&[
        r#"{"id":"c","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
        r#"{"id":"c","choices":[{"index":0,"delta":{"content":"2 + 2"},"finish_reason":null}]}"#,
        r#"{"id":"c","choices":[{"index":0,"delta":{"content":" = 4"},"finish_reason":null}]}"#,
        r#"{"id":"c","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
        r#"{"id":"c","choices":[],"usage":{"prompt_tokens":11,"completion_tokens":5,"total_tokens":16}}"#,
        "[DONE]",
    ]);
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJsonString(
            r#"{"model":"gpt-4-turbo-preview","stream":true}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let adapter = OpenAIAdapter::new().unwrap();
    let config = ProviderConfig::new("openai", "gpt-4-turbo-preview")
        .with_api_key("sk-test")
        .with_base_url(server.url());

    let chunks = run(&adapter, vec![ChatMessage::user("What is 2+2?")], config).await;

    mock.assert_async().await;
    assert_single_terminal_last(&chunks);
    assert_eq!(text_of(&chunks), "2 + 2 = 4");
    let terminal = chunks.last().unwrap();
    assert!(terminal.error.is_none());
    assert_eq!(terminal.finish_reason.as_deref(), Some("stop"));
    assert_eq!(terminal.usage.unwrap().total_tokens, 16);
    assert_eq!(terminal.model, "gpt-4-turbo-preview");
}

#[tokio::test]
async fn test_openai_http_error_becomes_error_chunk() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#)
        .create_async()
        .await;

    let adapter = OpenAIAdapter::new().unwrap();
    let config = ProviderConfig::new("openai", "gpt-4")
        .with_api_key("bad")
        .with_base_url(server.url());

    let chunks = run(&adapter, vec![ChatMessage::user("hi")], config).await;

    assert_eq!(chunks.len(), 1);
    let error = chunks[0].error.as_deref().unwrap();
    assert!(error.contains("401"));
    assert!(error.contains("Invalid API key"));
}

#[tokio::test]
async fn test_missing_credential_makes_no_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let adapter = OpenAIAdapter::new().unwrap();
    let config = ProviderConfig::new("openai", "gpt-4").with_base_url(server.url());

    let chunks = run(&adapter, vec![ChatMessage::user("hi")], config).await;

    mock.assert_async().await;
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].finished);
    assert!(chunks[0].error.as_deref().unwrap().contains("openai"));
}

#[tokio::test]
async fn test_stream_is_lazy_until_polled() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let adapter = OpenAIAdapter::new().unwrap();
    let config = ProviderConfig::new("openai", "gpt-4")
        .with_api_key("sk-test")
        .with_base_url(server.url());

    let stream = adapter.stream_chat(vec![ChatMessage::user("hi")], config);
    drop(stream);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_anthropic_error_event_after_partial_text() {
    let mut server = mockito::Server::new_async().await;
    let body = [
        "event: message_start",
        r#"data: {"type":"message_start","message":{"id":"m","usage":{"input_tokens":10,"output_tokens":1}}}"#,
        "",
        "event: content_block_delta",
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"The answer"}}"#,
        "",
        "event: error",
        r#"data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        "",
    ]
    .join("\n");
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "ak-test")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(Matcher::PartialJsonString(
            r#"{"system":"Be brief.","max_tokens":4096}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let adapter = AnthropicAdapter::new().unwrap();
    let config = ProviderConfig::new("anthropic", "claude-3-sonnet-20240229")
        .with_api_key("ak-test")
        .with_base_url(server.url());
    let messages = vec![ChatMessage::system("Be brief."), ChatMessage::user("Explain.")];

    let chunks = run(&adapter, messages, config).await;

    mock.assert_async().await;
    assert_single_terminal_last(&chunks);
    assert_eq!(text_of(&chunks), "The answer");
    assert_eq!(chunks.last().unwrap().error.as_deref(), Some("Overloaded"));
}

#[tokio::test]
async fn test_anthropic_completed_stream() {
    let mut server = mockito::Server::new_async().await;
    let body = sse(&[
        r#"{"type":"message_start","message":{"id":"m","usage":{"input_tokens":7,"output_tokens":1}}}"#,
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":" there"}}"#,
        r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":3}}"#,
        r#"{"type":"message_stop"}"#,
    ]);
    let _mock = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let adapter = AnthropicAdapter::new().unwrap();
    let config = ProviderConfig::new("anthropic", "claude-3-sonnet-20240229")
        .with_api_key("ak-test")
        .with_base_url(server.url());

    let chunks = run(&adapter, vec![ChatMessage::user("hello")], config).await;

    assert_single_terminal_last(&chunks);
    assert_eq!(text_of(&chunks), "Hi there");
    let terminal = chunks.last().unwrap();
    assert_eq!(terminal.finish_reason.as_deref(), Some("end_turn"));
    let usage = terminal.usage.unwrap();
    assert_eq!((usage.prompt_tokens, usage.completion_tokens, usage.total_tokens), (7, 3, 10));
}

#[tokio::test]
async fn test_google_grounding_sources() {
    let mut server = mockito::Server::new_async().await;
    let body = sse(&[
        r#"{"candidates":[{"content":{"parts":[{"text":"Team A "}],"role":"model"}}]}"#,
        r#"{"candidates":[{"content":{"parts":[{"text":"won."}],"role":"model"},"finishReason":"STOP","groundingMetadata":{"groundingChunks":[{"web":{"uri":"https://news.example/final","title":"news.example"}}]}}],"usageMetadata":{"promptTokenCount":6,"candidatesTokenCount":3,"totalTokenCount":9}}"#,
    ]);
    let mock = server
        .mock("POST", "/v1beta/models/gemini-2.5-flash:streamGenerateContent")
        .match_query(Matcher::UrlEncoded("alt".to_string(), "sse".to_string()))
        .match_header("x-goog-api-key", "g-test")
        .match_body(Matcher::PartialJsonString(
            r#"{"tools":[{"googleSearch":{}}]}"#.to_string(),
        ))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let adapter = GoogleAdapter::new().unwrap();
    let config = ProviderConfig::new("google", "gemini-2.5-flash")
        .with_api_key("g-test")
        .with_base_url(server.url())
        .web_grounding(true);
    let messages = vec![ChatMessage::system("Cite."), ChatMessage::user("Who won?")];

    let chunks = run(&adapter, messages, config).await;

    mock.assert_async().await;
    assert_single_terminal_last(&chunks);
    assert_eq!(text_of(&chunks), "Team A won.");
    let terminal = chunks.last().unwrap();
    assert_eq!(terminal.finish_reason.as_deref(), Some("stop"));
    assert_eq!(terminal.sources.len(), 1);
    assert_eq!(terminal.sources[0].url, "https://news.example/final");
    assert_eq!(terminal.sources[0].description, "");
    assert_eq!(terminal.sources[0].favicon, "📌");
}

#[tokio::test]
async fn test_local_cumulative_text_is_converted_to_deltas() {
    let mut server = mockito::Server::new_async().await;
    let body = sse(&[
        r#"{"choices":[{"delta":{"content":"Hel"}}]}"#,
        r#"{"choices":[{"delta":{"content":"Hello"}}]}"#,
        r#"{"choices":[{"delta":{"content":"Hello, world"},"finish_reason":"stop"}]}"#,
        "[DONE]",
    ]);
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let adapter = LocalAdapter::new().unwrap();
    let config = ProviderConfig::new("local", "llama2-7b")
        .with_base_url(server.url())
        .text_mode(TextMode::Cumulative);

    let chunks = run(&adapter, vec![ChatMessage::user("greet")], config).await;

    mock.assert_async().await;
    let deltas: Vec<&str> = chunks
        .iter()
        .filter(|c| !c.finished)
        .map(|c| c.content.as_str())
        .collect();
    assert_eq!(deltas, vec!["Hel", "lo", ", world"]);
    assert_single_terminal_last(&chunks);
}

#[tokio::test]
async fn test_streaming_disabled_coalesces_output() {
    let mut server = mockito::Server::new_async().await;
    let body = sse(&[
        r#"{"choices":[{"delta":{"content":"one "}}]}"#,
        r#"{"choices":[{"delta":{"content":"two"},"finish_reason":"stop"}]}"#,
        "[DONE]",
    ]);
    let _mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let adapter = LocalAdapter::new().unwrap();
    let config = ProviderConfig::new("local", "llama2-7b")
        .with_base_url(server.url())
        .streaming(false);

    let chunks = run(&adapter, vec![ChatMessage::user("count")], config).await;

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].content, "one two");
    assert!(chunks[1].finished);
}

#[tokio::test]
async fn test_malformed_frame_becomes_error_chunk() {
    let mut server = mockito::Server::new_async().await;
    let body = sse(&[r#"{"choices":[{"delta":{"content":"ok"}}]}"#, "{broken"]);
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let adapter = OpenAIAdapter::new().unwrap();
    let config = ProviderConfig::new("openai", "gpt-4")
        .with_api_key("sk")
        .with_base_url(server.url());

    let chunks = run(&adapter, vec![ChatMessage::user("hi")], config).await;

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].content, "ok");
    assert!(chunks[1].error.is_some());
}
