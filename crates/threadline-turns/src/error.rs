use thiserror::Error;

use threadline_llm::LlmError;
use threadline_persist::PersistError;

#[derive(Error, Debug)]
pub enum TurnError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Provider registry error: {0}")]
    Registry(#[from] LlmError),

    #[error("Persistence error: {0}")]
    Persist(PersistError),

    #[error("Orchestrator misconfigured: {0}")]
    Misconfigured(String),
}

impl From<PersistError> for TurnError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::UserNotFound(id) => TurnError::NotFound(format!("User {}", id)),
            PersistError::ThreadNotFound(id) => TurnError::NotFound(format!("Thread {}", id)),
            PersistError::TurnNotFound(id) => TurnError::NotFound(format!("Turn {}", id)),
            conflict @ PersistError::StatusConflict { .. } => {
                TurnError::InvalidState(conflict.to_string())
            }
            other => TurnError::Persist(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, TurnError>;
