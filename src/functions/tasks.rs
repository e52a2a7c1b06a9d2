use anyhow::Result;
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::error;

use crate::store::{decode_timestamp, TASKS_COLLECTION};
use crate::AppContext;

/// `getAllTasks` HTTP handler: every task document, newest first, each
/// serialized as `{id, ...fields}` with the fields exactly as stored.
///
/// One coarse error class: any failure collapses to a 500 with a generic
/// message; details go to the log only.
pub async fn get_all_tasks(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match list_task_documents(&ctx).await {
        Ok(tasks) => Ok(Json(json!({ "tasks": tasks }))),
        Err(e) => {
            error!("Error getting tasks: {e:#}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Something went wrong" })),
            ))
        }
    }
}

async fn list_task_documents(ctx: &AppContext) -> Result<Vec<Value>> {
    let rows = ctx.storage.list_documents(TASKS_COLLECTION).await?;

    let mut documents: Vec<(DateTime<Utc>, Value)> = rows
        .iter()
        .filter_map(|row| {
            // Same leniency as the store client: a document that is not a
            // JSON object is skipped, not fatal.
            let value: Value = serde_json::from_str(&row.data).ok()?;
            let fields: Map<String, Value> = value.as_object()?.clone();
            let created_at = fields
                .get("createdAt")
                .and_then(decode_timestamp)
                .unwrap_or(DateTime::UNIX_EPOCH);

            let mut doc = Map::new();
            doc.insert("id".to_string(), Value::String(row.id.clone()));
            doc.extend(fields);
            Some((created_at, Value::Object(doc)))
        })
        .collect();

    documents.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(documents.into_iter().map(|(_, doc)| doc).collect())
}
