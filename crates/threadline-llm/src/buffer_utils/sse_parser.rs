use futures::{Stream, StreamExt};
use reqwest::Response;
use std::pin::Pin;

use super::buffering::CircularLineBuffer;
use crate::error::{LlmError, Result};
use crate::streaming::ProviderEvent;

/// Strategy pattern for parsing different vendors' SSE payloads
pub trait SseLineParser: Send {
    /// Parse a data line into provider events
    fn parse_data_line(&self, data: &str) -> Result<Vec<ProviderEvent>>;

    /// Check if this line signals end of stream
    fn is_done_marker(&self, data: &str) -> bool {
        data == "[DONE]"
    }
}

/// Generic SSE stream parser using circular buffer.
/// Only `data:` lines are handed to the parser; `event:`, `id:` and comment
/// lines are skipped.
pub fn parse_sse_stream<P: SseLineParser + 'static>(
    response: Response,
    parser: P,
) -> Pin<Box<dyn Stream<Item = Result<ProviderEvent>> + Send>> {
    let stream = response.bytes_stream();

    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(stream);
        let mut buffer = CircularLineBuffer::with_capacity(4096);
        let mut ended = false;

        'body: while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(&bytes);

                    // Process all complete lines in buffer
                    while let Some(line_result) = buffer.next_line() {
                        match line_result {
                            Ok(line) => {
                                let Some(data) = data_payload(&line) else {
                                    continue;
                                };

                                if parser.is_done_marker(data) {
                                    yield Ok(ProviderEvent::Done);
                                    ended = true;
                                    break 'body;
                                }

                                match parser.parse_data_line(data) {
                                    Ok(events) => {
                                        for event in events {
                                            yield Ok(event);
                                        }
                                    }
                                    Err(e) => yield Err(e),
                                }
                            }
                            Err(e) => yield Err(e),
                        }
                    }
                }
                Err(e) => {
                    yield Err(LlmError::Stream(e.to_string()));
                    ended = true;
                    break;
                }
            }
        }

        // Body closed without a trailing newline
        if !ended {
            if let Some(Ok(line)) = buffer.take_remaining() {
                if let Some(data) = data_payload(&line) {
                    if parser.is_done_marker(data) {
                        yield Ok(ProviderEvent::Done);
                    } else {
                        match parser.parse_data_line(data) {
                            Ok(events) => {
                                for event in events {
                                    yield Ok(event);
                                }
                            }
                            Err(e) => yield Err(e),
                        }
                    }
                }
            }
        }
    })
}

fn data_payload(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() {
        None
    } else {
        Some(data)
    }
}
