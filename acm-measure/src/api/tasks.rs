//! Task monitoring and control endpoints
//!
//! GET /tasks, GET /tasks/:id, POST /tasks/:id/cancel,
//! POST /tasks/:id/keepalive, POST /tasks/:id/release, GET /tasks/:id/result

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::tasks::{TaskHandle, TaskSnapshot};
use crate::AppState;

/// GET /tasks query
#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    /// Only tasks with this name
    pub name: Option<String>,
}

/// POST /tasks/:id/cancel response
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// False when the task was already cancelling or finished
    pub cancelled: bool,
    pub task: TaskSnapshot,
}

/// POST /tasks/:id/release response
#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub task_id: Uuid,
    /// True when the task was finished and has been removed
    pub removed: bool,
}

async fn find_task(state: &AppState, id: Uuid) -> ApiResult<Arc<TaskHandle>> {
    state
        .registry
        .find_by_id(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Task not found: {}", id)))
}

/// GET /tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> Json<Vec<TaskSnapshot>> {
    let mut tasks = state.registry.list().await;
    if let Some(name) = query.name {
        tasks.retain(|task| task.name == name);
    }
    Json(tasks)
}

/// GET /tasks/:id
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskSnapshot>> {
    Ok(Json(find_task(&state, id).await?.snapshot()))
}

/// POST /tasks/:id/cancel
pub async fn cancel_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CancelResponse>> {
    let task = find_task(&state, id).await?;
    let cancelled = task.cancel();
    Ok(Json(CancelResponse {
        cancelled,
        task: task.snapshot(),
    }))
}

/// POST /tasks/:id/keepalive
pub async fn keep_alive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskSnapshot>> {
    let task = find_task(&state, id).await?;
    task.keep_alive();
    Ok(Json(task.snapshot()))
}

/// POST /tasks/:id/release
pub async fn release_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReleaseResponse>> {
    let removed = state
        .registry
        .release(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Task not found: {}", id)))?;
    tracing::info!(task_id = %id, removed, "Task release requested");
    Ok(Json(ReleaseResponse { task_id: id, removed }))
}

/// GET /tasks/:id/result
///
/// Streams the output CSV as written so far, also while the task runs.
/// Counts as a keep-alive.
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let task = find_task(&state, id).await?;
    task.keep_alive();

    let path = task
        .result_path()
        .ok_or_else(|| ApiError::Conflict(format!("Task {} has no result yet", id)))?;
    let file = tokio::fs::File::open(&path).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.csv\"", id),
            ),
        ],
        body,
    ))
}

/// Build task routes
pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/:id", get(get_task))
        .route("/tasks/:id/cancel", post(cancel_task))
        .route("/tasks/:id/keepalive", post(keep_alive))
        .route("/tasks/:id/release", post(release_task))
        .route("/tasks/:id/result", get(get_result))
}
