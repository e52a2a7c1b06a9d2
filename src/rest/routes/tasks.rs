// rest/routes/tasks.rs — document-store routes for the task collection.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppContext;

type RouteError = (StatusCode, Json<Value>);

fn internal_error(e: anyhow::Error) -> RouteError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
}

/// Decoded task projections, newest first.
pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, RouteError> {
    let tasks = ctx.task_store().snapshot().await.map_err(internal_error)?;
    Ok(Json(json!({ "tasks": tasks })))
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<Json<Value>, RouteError> {
    let task = ctx
        .task_store()
        .create_task(&body.title)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!({ "id": task.id })))
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(rename = "isCompleted")]
    pub is_completed: bool,
}

/// Partial update of the completion flag. Updating a task that no longer
/// exists is a no-op, matching the store client's contract.
pub async fn update_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Json<Value>, RouteError> {
    ctx.task_store()
        .set_task_completed(&id, body.is_completed)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!({ "ok": true })))
}

/// Idempotent delete.
pub async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, RouteError> {
    ctx.task_store()
        .delete_task(&id)
        .await
        .map_err(internal_error)?;
    Ok(Json(json!({ "ok": true })))
}
