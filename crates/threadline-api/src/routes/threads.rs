use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use threadline_persist::Thread;
use threadline_turns::DisplayMessage;

use crate::{
    error::{ApiError, ApiResult},
    extract::CallerIdentity,
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiateThreadRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    /// Continue this thread instead of starting a new one
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiateThreadResponse {
    pub thread_id: String,
    pub turn_id: String,
    pub thread_title: String,
    pub message: String,
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThreadResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl From<Thread> for ThreadResponse {
    fn from(thread: Thread) -> Self {
        Self {
            id: thread.id,
            user_id: thread.user_id,
            title: thread.title,
            created_at: thread.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ThreadTurnsResponse {
    #[schema(value_type = Vec<Object>)]
    pub turns: Vec<DisplayMessage>,
}

/// Start a turn, creating the thread when needed
#[utoipa::path(
    post,
    path = "/api/thread/initiate",
    request_body = InitiateThreadRequest,
    params(("x-user-id" = String, Header, description = "Acting user")),
    responses(
        (status = 201, description = "Turn created", body = InitiateThreadResponse),
        (status = 400, description = "Missing user or prompt"),
        (status = 404, description = "Unknown user or thread")
    ),
    tag = "threads"
)]
pub async fn initiate_thread(
    State(state): State<AppState>,
    CallerIdentity(user_id): CallerIdentity,
    Json(req): Json<InitiateThreadRequest>,
) -> ApiResult<(StatusCode, Json<InitiateThreadResponse>)> {
    let prompt = req
        .prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing required fields".to_string()))?;

    let initiated = state
        .orchestrator
        .initiate_turn(&user_id, &prompt, req.thread_id.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InitiateThreadResponse {
            thread_id: initiated.thread_id,
            turn_id: initiated.turn_id,
            thread_title: initiated.thread_title,
            message: "Thread initiated successfully".to_string(),
            user_id,
        }),
    ))
}

/// List the caller's threads, newest first
#[utoipa::path(
    get,
    path = "/api/thread/all",
    params(("x-user-id" = String, Header, description = "Acting user")),
    responses(
        (status = 200, description = "Threads", body = Vec<ThreadResponse>)
    ),
    tag = "threads"
)]
pub async fn list_threads(
    State(state): State<AppState>,
    CallerIdentity(user_id): CallerIdentity,
) -> ApiResult<Json<Vec<ThreadResponse>>> {
    let threads = state.orchestrator.list_threads(&user_id).await?;
    Ok(Json(threads.into_iter().map(ThreadResponse::from).collect()))
}

/// Flattened display messages of a thread
#[utoipa::path(
    get,
    path = "/api/thread/turns/{thread_id}",
    params(
        ("thread_id" = String, Path, description = "Thread ID"),
        ("x-user-id" = String, Header, description = "Acting user")
    ),
    responses(
        (status = 200, description = "Thread messages", body = ThreadTurnsResponse),
        (status = 404, description = "Thread not found")
    ),
    tag = "threads"
)]
pub async fn get_thread_turns(
    State(state): State<AppState>,
    CallerIdentity(user_id): CallerIdentity,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<ThreadTurnsResponse>> {
    let view = state
        .orchestrator
        .get_thread_turns(&thread_id, Some(&user_id))
        .await?;

    Ok(Json(ThreadTurnsResponse {
        turns: view.messages,
    }))
}
