mod db_thread;
mod db_turn;

// Export database-agnostic models
pub use db_thread::{Thread, User};
pub use db_turn::{
    CompletionMetadata, FailureMetadata, StartTurn, StartedTurn, Turn, TurnMetadata, TurnStatus,
    TurnUpdate,
};
