use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::CorsConfig,
    docs::{ApiDoc, OPENAPI_PATH, SWAGGER_PATH},
    handlers::stream,
    middleware::logging,
    routes::{health, threads},
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Threads
        .route("/thread/initiate", post(threads::initiate_thread))
        .route("/thread/all", get(threads::list_threads))
        .route("/thread/turns/:thread_id", get(threads::get_thread_turns))
        // Turns
        .route("/turn/:turn_id/chat", get(stream::stream_turn));

    let cors = build_cors_layer(&state.config.cors);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes)
        .merge(SwaggerUi::new(SWAGGER_PATH).url(OPENAPI_PATH, ApiDoc::openapi()))
        .layer(middleware::from_fn(logging::log_request))
        // Bounds time-to-headers only; SSE bodies are not cut off
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.enabled {
        let mut cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any);

        if config.origins.iter().any(|o| o == "*") {
            cors = cors.allow_origin(Any);
        } else {
            let origins: Vec<axum::http::HeaderValue> = config
                .origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            cors = cors.allow_origin(origins);
        }

        cors
    } else {
        CorsLayer::permissive()
    }
}
