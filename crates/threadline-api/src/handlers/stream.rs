use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;

use threadline_llm::StreamChunk;

use crate::{error::ApiResult, state::AppState};

/// Sentinel data frame sent after the terminal chunk
pub const DONE_SENTINEL: &str = "[DONE]";

/// Stream a `processing` turn using Server-Sent Events
///
/// Each chunk is one `data:` frame; the stream ends with `data: [DONE]`.
/// Rejections (unknown, terminal or already-streaming turn) are plain 404s.
#[utoipa::path(
    get,
    path = "/api/turn/{turn_id}/chat",
    params(("turn_id" = String, Path, description = "Turn ID")),
    responses(
        (status = 200, description = "Streaming response", content_type = "text/event-stream"),
        (status = 404, description = "Turn not found or not streamable")
    ),
    tag = "turns"
)]
pub async fn stream_turn(
    State(state): State<AppState>,
    Path(turn_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let receiver = state.orchestrator.stream_turn(&turn_id).await?;

    let events = ReceiverStream::new(receiver)
        .map(|chunk| Ok::<Event, Infallible>(chunk_event(&chunk)))
        .chain(stream::once(async {
            Ok::<Event, Infallible>(Event::default().data(DONE_SENTINEL))
        }));

    let keepalive = KeepAlive::new()
        .interval(Duration::from_secs(state.config.stream.keepalive_secs.max(1)))
        .text("keep-alive");

    Ok(Sse::new(events).keep_alive(keepalive))
}

fn chunk_event(chunk: &StreamChunk) -> Event {
    Event::default().json_data(chunk).unwrap_or_else(|e| {
        tracing::error!(chunk_id = %chunk.id, "Failed to serialize chunk: {}", e);
        Event::default().comment("unserializable chunk")
    })
}
