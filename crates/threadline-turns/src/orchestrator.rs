use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use threadline_llm::{ChatAdapter, ChatMessage, ProviderConfig, ProviderRegistry, StreamChunk};
use threadline_persist::{
    PersistError, PersistenceClient, StartTurn, Thread, Turn, TurnStatus, TurnUpdate,
};

use crate::accumulator::TurnAccumulator;
use crate::claims::{StreamClaim, StreamClaims};
use crate::config::TurnConfig;
use crate::display::ThreadTurns;
use crate::error::{Result, TurnError};
use crate::history::build_history;

/// Identifiers handed back to the client to open the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiatedTurn {
    pub thread_id: String,
    pub turn_id: String,
    pub thread_title: String,
}

pub struct TurnOrchestrator {
    registry: Arc<ProviderRegistry>,
    persistence: Arc<dyn PersistenceClient>,
    config: TurnConfig,
    claims: StreamClaims,
}

impl TurnOrchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        persistence: Arc<dyn PersistenceClient>,
        config: TurnConfig,
    ) -> Self {
        Self {
            registry,
            persistence,
            config,
            claims: StreamClaims::new(),
        }
    }

    /// Create a builder for fluent construction
    pub fn builder() -> TurnOrchestratorBuilder {
        TurnOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn claims(&self) -> &StreamClaims {
        &self.claims
    }

    /// Validate the request and atomically create the thread (if needed) and
    /// a `processing` turn
    pub async fn initiate_turn(
        &self,
        user_id: &str,
        prompt: &str,
        thread_id: Option<&str>,
    ) -> Result<InitiatedTurn> {
        if user_id.trim().is_empty() {
            return Err(TurnError::Validation("userId is required".to_string()));
        }
        if prompt.trim().is_empty() {
            return Err(TurnError::Validation("prompt is required".to_string()));
        }

        if self.persistence.get_user(user_id).await?.is_none() {
            return Err(TurnError::NotFound(format!("User {}", user_id)));
        }

        let provider_config = self.registry.resolve_config(&self.config.default_config)?;

        let started = self
            .persistence
            .start_turn(StartTurn {
                user_id: user_id.to_string(),
                thread_id: thread_id.filter(|id| !id.is_empty()).map(str::to_string),
                title: self.config.title_for(prompt),
                prompt: prompt.to_string(),
                llm_model: provider_config.model,
            })
            .await?;

        info!(
            user_id = %user_id,
            thread_id = %started.thread.id,
            turn_id = %started.turn.id,
            thread_created = started.thread_created,
            "Turn initiated"
        );

        Ok(InitiatedTurn {
            thread_id: started.thread.id,
            turn_id: started.turn.id,
            thread_title: started.thread.title,
        })
    }

    /// Start streaming a `processing` turn.
    ///
    /// Every rejection happens before the receiver is returned. The spawned
    /// task relays chunks in order, persists the terminal state with a
    /// compare-and-swap, relays the terminal chunk and then closes the channel.
    pub async fn stream_turn(&self, turn_id: &str) -> Result<mpsc::Receiver<StreamChunk>> {
        self.load_streamable(turn_id).await?;

        let claim = self.claims.try_claim(turn_id).ok_or_else(|| {
            TurnError::InvalidState(format!("Turn {} is already being streamed", turn_id))
        })?;

        // A stream that held the claim may have finished between the first
        // read and the claim
        let turn = self.load_streamable(turn_id).await?;

        let prior = self
            .persistence
            .list_thread_turns(&turn.thread_id, Some(TurnStatus::Completed))
            .await?;
        let history = build_history(
            self.config.system_prompt.as_deref(),
            &prior,
            &turn.user_prompt,
        );

        let (adapter, provider_config) = self.registry.resolve(&self.config.default_config)?;

        debug!(
            turn_id = %turn_id,
            adapter = adapter.name(),
            model = %provider_config.model,
            history_len = history.len(),
            "Opening provider stream"
        );

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        tokio::spawn(relay_turn(
            adapter,
            history,
            provider_config,
            Arc::clone(&self.persistence),
            claim,
            tx,
        ));

        Ok(rx)
    }

    async fn load_streamable(&self, turn_id: &str) -> Result<Turn> {
        let turn = self
            .persistence
            .get_turn(turn_id)
            .await?
            .ok_or_else(|| TurnError::NotFound(format!("Turn {}", turn_id)))?;

        if turn.status != TurnStatus::Processing {
            return Err(TurnError::InvalidState(format!(
                "Turn {} is {} and cannot be streamed",
                turn_id, turn.status
            )));
        }
        Ok(turn)
    }

    /// Threads of a user, newest first
    pub async fn list_threads(&self, user_id: &str) -> Result<Vec<Thread>> {
        Ok(self.persistence.list_threads(user_id).await?)
    }

    /// Thread with its turns flattened into display messages. When `caller`
    /// is given, a thread owned by someone else is reported as not found.
    pub async fn get_thread_turns(
        &self,
        thread_id: &str,
        caller: Option<&str>,
    ) -> Result<ThreadTurns> {
        let thread = self
            .persistence
            .get_thread(thread_id)
            .await?
            .filter(|t| caller.map_or(true, |user| t.user_id == user))
            .ok_or_else(|| TurnError::NotFound(format!("Thread {}", thread_id)))?;

        let turns = self.persistence.list_thread_turns(thread_id, None).await?;
        Ok(ThreadTurns::new(thread, &turns))
    }

    /// Fail `processing` turns untouched for longer than `max_age` that have
    /// no live stream in this process. Returns how many were failed.
    pub async fn fail_stale_turns(&self, max_age: Duration) -> Result<usize> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| TurnError::Validation(format!("Invalid stale age: {}", e)))?;
        let cutoff = chrono::Utc::now() - max_age;

        let stale = self.persistence.list_stale_turns(cutoff).await?;
        let mut failed = 0;

        for turn in stale {
            if self.claims.is_claimed(&turn.id) {
                continue;
            }

            let update = TurnUpdate::failed(format!(
                "Turn abandoned: no stream completed it within {}s",
                max_age.num_seconds()
            ));
            match self
                .persistence
                .transition_turn(&turn.id, TurnStatus::Processing, update)
                .await
            {
                Ok(_) => failed += 1,
                // Completed concurrently; nothing to do
                Err(PersistError::StatusConflict { .. }) => {}
                Err(e) => warn!(turn_id = %turn.id, "Failed to expire stale turn: {}", e),
            }
        }

        if failed > 0 {
            info!(count = failed, "Failed stale processing turns");
        }
        Ok(failed)
    }
}

/// Streaming task for one turn. Ends when the terminal chunk has been
/// relayed or the client goes away.
async fn relay_turn(
    adapter: Arc<dyn ChatAdapter>,
    history: Vec<ChatMessage>,
    config: ProviderConfig,
    persistence: Arc<dyn PersistenceClient>,
    claim: StreamClaim,
    tx: mpsc::Sender<StreamChunk>,
) {
    let turn_id = claim.turn_id().to_string();
    let mut accumulator = TurnAccumulator::new(config.model.clone());
    let mut chunks = adapter.stream_chat(history, config);

    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                info!(turn_id = %turn_id, "Client disconnected; turn left processing");
                return;
            }
            next = chunks.next() => next,
        };

        let chunk = match next {
            Some(chunk) => chunk,
            None => {
                warn!(turn_id = %turn_id, "Provider stream ended without a terminal chunk");
                accumulator.truncated()
            }
        };

        match accumulator.push(&chunk) {
            None => {
                if tx.send(chunk).await.is_err() {
                    info!(turn_id = %turn_id, "Client disconnected; turn left processing");
                    return;
                }
            }
            Some(update) => {
                // Persist before the terminal chunk goes out
                let chunk = match persist_terminal(persistence.as_ref(), &turn_id, update).await {
                    Outcome::Superseded => {
                        StreamChunk::failed(chunk.id, chunk.model, "turn already finalized")
                    }
                    Outcome::Stored | Outcome::Unsaved => chunk,
                };
                let _ = tx.send(chunk).await;
                return;
            }
        }
    }
}

/// What happened to a turn's terminal write
enum Outcome {
    Stored,
    /// Another writer finalized the turn first
    Superseded,
    /// Storage failed; the client still gets its result
    Unsaved,
}

async fn persist_terminal(
    persistence: &dyn PersistenceClient,
    turn_id: &str,
    update: TurnUpdate,
) -> Outcome {
    let status = update.status();
    match persistence
        .transition_turn(turn_id, TurnStatus::Processing, update)
        .await
    {
        Ok(_) => {
            info!(turn_id = %turn_id, status = %status, "Turn finished");
            Outcome::Stored
        }
        Err(PersistError::StatusConflict { actual, .. }) => {
            warn!(turn_id = %turn_id, actual = %actual, "Turn already terminal; result discarded");
            Outcome::Superseded
        }
        Err(e) => {
            error!(turn_id = %turn_id, "Failed to persist turn result: {}", e);
            Outcome::Unsaved
        }
    }
}

/// Builder for constructing a TurnOrchestrator
pub struct TurnOrchestratorBuilder {
    registry: Option<Arc<ProviderRegistry>>,
    persistence: Option<Arc<dyn PersistenceClient>>,
    config: TurnConfig,
}

impl TurnOrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            persistence: None,
            config: TurnConfig::default(),
        }
    }

    /// Set the provider registry
    pub fn registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the persistence backend
    pub fn persistence(mut self, client: Arc<dyn PersistenceClient>) -> Self {
        self.persistence = Some(client);
        self
    }

    pub fn config(mut self, config: TurnConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the orchestrator. The default config must be registered.
    pub fn build(self) -> Result<TurnOrchestrator> {
        let registry = self
            .registry
            .ok_or_else(|| TurnError::Misconfigured("provider registry is required".to_string()))?;
        let persistence = self
            .persistence
            .ok_or_else(|| TurnError::Misconfigured("persistence client is required".to_string()))?;

        registry.resolve_config(&self.config.default_config)?;

        Ok(TurnOrchestrator::new(registry, persistence, self.config))
    }
}

impl Default for TurnOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
