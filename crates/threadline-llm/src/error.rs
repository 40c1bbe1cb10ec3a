use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Unsupported LLM provider: {0}")]
    UnsupportedProvider(String),

    #[error("Unknown LLM configuration: {0}")]
    UnknownConfig(String),

    #[error("Invalid conversation: {0}")]
    InvalidConversation(String),

    #[error("Missing credential for provider: {0}")]
    MissingCredential(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Failed to parse provider payload: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
