pub mod buffer_utils;
pub mod config;
pub mod delta;
pub mod error;
pub mod providers;
pub mod registry;
pub mod streaming;
pub mod traits;
pub mod types;

#[cfg(feature = "testing")]
pub mod scripted;

pub use config::{
    default_configs, ProviderConfig, ProviderCredentials, ProviderKind, ProviderTools, TextMode,
};
pub use error::LlmError;
pub use providers::{AnthropicAdapter, GoogleAdapter, LocalAdapter, OpenAIAdapter};
pub use registry::ProviderRegistry;
pub use streaming::{ProviderEvent, UsageUpdate};
pub use traits::{ChatAdapter, ChunkStream};
pub use types::{ChatMessage, Role, Source, StreamChunk, TokenUsage};

#[cfg(feature = "testing")]
pub use scripted::{ScriptStep, ScriptedAdapter};
