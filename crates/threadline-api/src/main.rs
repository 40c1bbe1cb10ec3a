use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use threadline_api::{
    build_router,
    config::{Backend, Config, TurnsConfig},
    AppState,
};
use threadline_persist::{InMemoryPersistenceClient, PersistenceClient, User};
use threadline_turns::TurnOrchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config =
        Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize logging
    init_logging(&config);

    tracing::info!("Starting Threadline API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    let registry = Arc::new(config.llm.build_registry(&config.credentials));
    tracing::info!(
        default_config = %config.llm.default_config,
        configs = registry.list_configs().len(),
        "Provider registry ready"
    );

    let persistence = connect_persistence(&config).await?;

    let orchestrator = Arc::new(
        TurnOrchestrator::builder()
            .registry(registry)
            .persistence(Arc::clone(&persistence))
            .config(config.turn_config())
            .build()?,
    );

    spawn_stale_sweeper(Arc::clone(&orchestrator), &config.turns);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, orchestrator, persistence);
    let app = build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("API docs: http://{}/api/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn connect_persistence(config: &Config) -> anyhow::Result<Arc<dyn PersistenceClient>> {
    match config.persistence.backend {
        Backend::Memory => {
            tracing::warn!("Using in-memory persistence; data is lost on restart");
            let client = InMemoryPersistenceClient::new();
            for id in &config.persistence.seed_users {
                client.insert_user(User::new(id.clone())).await;
            }
            Ok(Arc::new(client))
        }
        Backend::Mongodb => connect_mongodb(config).await,
    }
}

#[cfg(feature = "mongodb")]
async fn connect_mongodb(config: &Config) -> anyhow::Result<Arc<dyn PersistenceClient>> {
    let uri = config
        .mongodb_uri
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("MONGODB_URI is required for the mongodb backend"))?;

    tracing::info!("Connecting to MongoDB");
    let client =
        threadline_persist::MongoPersistenceClient::connect(uri, &config.persistence.database)
            .await?;
    tracing::info!("MongoDB connected");

    Ok(Arc::new(client))
}

#[cfg(not(feature = "mongodb"))]
async fn connect_mongodb(_config: &Config) -> anyhow::Result<Arc<dyn PersistenceClient>> {
    anyhow::bail!("mongodb backend requested but the `mongodb` feature is disabled")
}

fn spawn_stale_sweeper(orchestrator: Arc<TurnOrchestrator>, turns: &TurnsConfig) {
    if turns.stale_after_secs == 0 {
        return;
    }

    let max_age = Duration::from_secs(turns.stale_after_secs);
    let period = Duration::from_secs(turns.sweep_interval_secs.max(1));
    tracing::info!(
        stale_after_secs = turns.stale_after_secs,
        "Stale turn sweeper enabled"
    );

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = orchestrator.fail_stale_turns(max_age).await {
                tracing::warn!("Stale turn sweep failed: {}", e);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
