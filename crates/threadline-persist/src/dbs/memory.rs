use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{PersistError, Result};
use crate::models::{StartTurn, StartedTurn, Thread, Turn, TurnStatus, TurnUpdate, User};
use crate::trait_client::PersistenceClient;

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    // Insertion order doubles as the tie-breaker for equal timestamps
    threads: Vec<Thread>,
    turns: Vec<Turn>,
}

/// Process-local persistence backend
///
/// Every operation runs under a single lock, so `start_turn` and
/// `transition_turn` are atomic without further coordination.
#[derive(Default)]
pub struct InMemoryPersistenceClient {
    state: RwLock<State>,
}

impl InMemoryPersistenceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user; users are normally provisioned by the auth service
    pub async fn insert_user(&self, user: User) {
        self.state.write().await.users.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl PersistenceClient for InMemoryPersistenceClient {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn start_turn(&self, input: StartTurn) -> Result<StartedTurn> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&input.user_id) {
            return Err(PersistError::UserNotFound(input.user_id));
        }

        let existing = input
            .thread_id
            .as_deref()
            .and_then(|id| state.threads.iter().find(|t| t.id == id));

        let (thread, thread_created) = match existing {
            Some(thread) if thread.user_id != input.user_id => {
                return Err(PersistError::ThreadNotFound(thread.id.clone()));
            }
            Some(thread) => (thread.clone(), false),
            None => {
                let thread = Thread {
                    id: input
                        .thread_id
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    user_id: input.user_id,
                    title: input.title,
                    created_at: Utc::now(),
                };
                state.threads.push(thread.clone());
                (thread, true)
            }
        };

        let turn = Turn::processing(&thread.id, input.prompt, input.llm_model);
        state.turns.push(turn.clone());

        Ok(StartedTurn {
            thread,
            turn,
            thread_created,
        })
    }

    async fn get_turn(&self, turn_id: &str) -> Result<Option<Turn>> {
        let state = self.state.read().await;
        Ok(state.turns.iter().find(|t| t.id == turn_id).cloned())
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        let state = self.state.read().await;
        Ok(state.threads.iter().find(|t| t.id == thread_id).cloned())
    }

    async fn list_thread_turns(
        &self,
        thread_id: &str,
        status: Option<TurnStatus>,
    ) -> Result<Vec<Turn>> {
        let state = self.state.read().await;
        let mut turns: Vec<Turn> = state
            .turns
            .iter()
            .filter(|t| t.thread_id == thread_id)
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps
        turns.sort_by_key(|t| t.created_at);
        Ok(turns)
    }

    async fn transition_turn(
        &self,
        turn_id: &str,
        expected: TurnStatus,
        update: TurnUpdate,
    ) -> Result<Turn> {
        let mut state = self.state.write().await;
        let turn = state
            .turns
            .iter_mut()
            .find(|t| t.id == turn_id)
            .ok_or_else(|| PersistError::TurnNotFound(turn_id.to_string()))?;

        if turn.status != expected {
            return Err(PersistError::StatusConflict {
                turn_id: turn_id.to_string(),
                expected,
                actual: turn.status,
            });
        }

        turn.apply(update, Utc::now());
        Ok(turn.clone())
    }

    async fn list_threads(&self, user_id: &str) -> Result<Vec<Thread>> {
        let state = self.state.read().await;
        let mut threads: Vec<Thread> = state
            .threads
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        // Newest first; later inserts win ties
        threads.reverse();
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(threads)
    }

    async fn list_stale_turns(&self, before: DateTime<Utc>) -> Result<Vec<Turn>> {
        let state = self.state.read().await;
        Ok(state
            .turns
            .iter()
            .filter(|t| t.status == TurnStatus::Processing && t.updated_at < before)
            .cloned()
            .collect())
    }
}
