use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::{config::Backend, state::AppState};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub services: HashMap<String, String>,
}

/// Health check endpoint
///
/// Returns the health status of the API and its dependencies
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut services = HashMap::new();

    let backend = match state.config.persistence.backend {
        Backend::Memory => "memory",
        Backend::Mongodb => "mongodb",
    };
    // Lightweight lookup to exercise the persistence connection
    let persistence = match state.persistence.get_user("_health_check").await {
        Ok(_) => "connected",
        Err(e) => {
            tracing::warn!("Persistence health check failed: {}", e);
            "disconnected"
        }
    };
    services.insert(backend.to_string(), persistence.to_string());

    let llm = match state
        .orchestrator
        .registry()
        .resolve_config(&state.orchestrator.config().default_config)
    {
        Ok(config) => format!("{}/{}", config.provider, config.model),
        Err(_) => "unconfigured".to_string(),
    };
    services.insert("llm".to_string(), llm);

    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services,
    })
}
