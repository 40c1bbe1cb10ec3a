use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{Client, ClientSession};
use tracing::{debug, warn};

use crate::dbs::mongo::models::{MongoThread, MongoTurn};
use crate::dbs::mongo::repositories::{
    MongoThreadRepository, MongoTurnRepository, MongoUserRepository,
};
use crate::error::{PersistError, Result};
use crate::models::{StartTurn, StartedTurn, Thread, Turn, TurnStatus, TurnUpdate, User};
use crate::trait_client::PersistenceClient;

/// MongoDB backend. `start_turn` runs in a multi-document transaction, which
/// requires a replica set or sharded deployment.
pub struct MongoPersistenceClient {
    client: Client,
    user_repo: MongoUserRepository,
    thread_repo: MongoThreadRepository,
    turn_repo: MongoTurnRepository,
}

impl MongoPersistenceClient {
    /// Connect to MongoDB and create client
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        Ok(Self {
            user_repo: MongoUserRepository::new(&client, database),
            thread_repo: MongoThreadRepository::new(&client, database),
            turn_repo: MongoTurnRepository::new(&client, database),
            client,
        })
    }

    async fn start_turn_in(
        &self,
        session: &mut ClientSession,
        input: StartTurn,
    ) -> Result<StartedTurn> {
        if !self.user_repo.exists_in(session, &input.user_id).await? {
            return Err(PersistError::UserNotFound(input.user_id));
        }

        let existing = match input.thread_id.as_deref() {
            Some(id) => self.thread_repo.get_thread_in(session, id).await?,
            None => None,
        };

        let (thread, thread_created) = match existing {
            Some(thread) if thread.user_id != input.user_id => {
                return Err(PersistError::ThreadNotFound(thread.id));
            }
            Some(thread) => (Thread::from(thread), false),
            None => {
                let thread = Thread {
                    id: input
                        .thread_id
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    user_id: input.user_id,
                    title: input.title,
                    created_at: Utc::now(),
                };
                self.thread_repo
                    .insert_in(session, &MongoThread::from(thread.clone()))
                    .await?;
                (thread, true)
            }
        };

        let turn = Turn::processing(&thread.id, input.prompt, input.llm_model);
        self.turn_repo
            .insert_in(session, &MongoTurn::from(turn.clone()))
            .await?;

        Ok(StartedTurn {
            thread,
            turn,
            thread_created,
        })
    }
}

#[async_trait]
impl PersistenceClient for MongoPersistenceClient {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let user = self.user_repo.get_user(user_id).await?;
        Ok(user.map(Into::into))
    }

    async fn start_turn(&self, input: StartTurn) -> Result<StartedTurn> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        match self.start_turn_in(&mut session, input).await {
            Ok(started) => {
                session.commit_transaction().await?;
                debug!(
                    thread_id = %started.thread.id,
                    turn_id = %started.turn.id,
                    "Committed turn start"
                );
                Ok(started)
            }
            Err(e) => {
                if let Err(abort) = session.abort_transaction().await {
                    warn!("Failed to abort turn start transaction: {}", abort);
                }
                Err(e)
            }
        }
    }

    async fn get_turn(&self, turn_id: &str) -> Result<Option<Turn>> {
        let turn = self.turn_repo.get_turn(turn_id).await?;
        Ok(turn.map(Into::into))
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        let thread = self.thread_repo.get_thread(thread_id).await?;
        Ok(thread.map(Into::into))
    }

    async fn list_thread_turns(
        &self,
        thread_id: &str,
        status: Option<TurnStatus>,
    ) -> Result<Vec<Turn>> {
        let turns = self.turn_repo.list_turns(thread_id, status).await?;
        Ok(turns.into_iter().map(Into::into).collect())
    }

    async fn transition_turn(
        &self,
        turn_id: &str,
        expected: TurnStatus,
        update: TurnUpdate,
    ) -> Result<Turn> {
        if let Some(turn) = self
            .turn_repo
            .transition(turn_id, expected, update, Utc::now())
            .await?
        {
            return Ok(turn.into());
        }

        // Nothing matched: tell a missing turn apart from a lost race
        match self.turn_repo.get_turn(turn_id).await? {
            Some(current) => Err(PersistError::StatusConflict {
                turn_id: turn_id.to_string(),
                expected,
                actual: current.status,
            }),
            None => Err(PersistError::TurnNotFound(turn_id.to_string())),
        }
    }

    async fn list_threads(&self, user_id: &str) -> Result<Vec<Thread>> {
        let threads = self.thread_repo.list_threads(user_id).await?;
        Ok(threads.into_iter().map(Into::into).collect())
    }

    async fn list_stale_turns(&self, before: DateTime<Utc>) -> Result<Vec<Turn>> {
        let turns = self.turn_repo.list_stale(before).await?;
        Ok(turns.into_iter().map(Into::into).collect())
    }
}
