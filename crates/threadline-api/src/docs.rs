use utoipa::OpenApi;

use crate::{handlers::stream, routes::health, routes::threads};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        threads::initiate_thread,
        threads::list_threads,
        threads::get_thread_turns,
        stream::stream_turn,
    ),
    components(schemas(
        health::HealthResponse,
        threads::InitiateThreadRequest,
        threads::InitiateThreadResponse,
        threads::ThreadResponse,
        threads::ThreadTurnsResponse,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "threads", description = "Thread initiation and history"),
        (name = "turns", description = "Turn streaming over SSE")
    )
)]
pub struct ApiDoc;

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";
pub const SWAGGER_PATH: &str = "/api/docs";
