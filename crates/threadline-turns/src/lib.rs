pub mod accumulator;
pub mod claims;
pub mod config;
pub mod display;
pub mod error;
pub mod history;
pub mod orchestrator;

pub use accumulator::TurnAccumulator;
pub use claims::{StreamClaim, StreamClaims};
pub use config::TurnConfig;
pub use display::{DisplayKind, DisplayMessage, ThreadTurns};
pub use error::{Result, TurnError};
pub use history::build_history;
pub use orchestrator::{InitiatedTurn, TurnOrchestrator, TurnOrchestratorBuilder};
