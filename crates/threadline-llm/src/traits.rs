use futures::Stream;
use std::pin::Pin;

use crate::config::ProviderConfig;
use crate::types::{ChatMessage, StreamChunk};

/// Lazy, finite, non-restartable sequence of normalized chunks
pub type ChunkStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// A vendor-specific streaming chat implementation.
///
/// The returned stream yields zero or more delta chunks followed by exactly
/// one terminal chunk (`finished = true`). Failures are reported in-band on
/// that terminal chunk via `error`; the stream itself never fails. No network
/// activity happens until the stream is first polled.
pub trait ChatAdapter: Send + Sync {
    /// Registry tag of this adapter
    fn name(&self) -> &str;

    fn stream_chat(&self, messages: Vec<ChatMessage>, config: ProviderConfig) -> ChunkStream;
}
