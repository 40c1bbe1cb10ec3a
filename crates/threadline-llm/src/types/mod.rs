pub mod chunk;
pub mod message;

pub use chunk::{Source, StreamChunk, TokenUsage};
pub use message::{fold_system_into_first_user, split_system, ChatMessage, Role};
