use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{StartTurn, StartedTurn, Thread, Turn, TurnStatus, TurnUpdate, User};

/// Trait for database persistence operations
///
/// Implementations provide database-specific CRUD operations
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    /// Get a user by ID
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Find-or-create the thread and create a `processing` turn in it, as one
    /// atomic unit. A thread owned by another user is reported as not found.
    async fn start_turn(&self, input: StartTurn) -> Result<StartedTurn>;

    /// Get a turn by ID
    async fn get_turn(&self, turn_id: &str) -> Result<Option<Turn>>;

    /// Get a thread by ID
    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>>;

    /// Turns of a thread, oldest first, optionally filtered by status
    async fn list_thread_turns(
        &self,
        thread_id: &str,
        status: Option<TurnStatus>,
    ) -> Result<Vec<Turn>>;

    /// Conditional status transition: applies `update` only if the turn is
    /// currently `expected`, otherwise fails with `StatusConflict`
    async fn transition_turn(
        &self,
        turn_id: &str,
        expected: TurnStatus,
        update: TurnUpdate,
    ) -> Result<Turn>;

    /// List threads for a user, newest first
    async fn list_threads(&self, user_id: &str) -> Result<Vec<Thread>>;

    /// `processing` turns last touched before `before`
    async fn list_stale_turns(&self, before: DateTime<Utc>) -> Result<Vec<Turn>>;
}
