use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppContext;

#[derive(Debug, Deserialize)]
pub struct HelloRequest {
    pub message: Option<String>,
}

/// `helloWorld` callable: echoes the caller's message with a timestamp.
///
/// Pure — no side effects. An absent (or empty) message substitutes a fixed
/// placeholder rather than failing. Concurrency is bounded by the
/// `functions.max_instances` semaphore; excess invocations wait for a slot.
pub async fn hello_world(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<HelloRequest>,
) -> Json<Value> {
    let _permit = ctx.functions_limit.acquire().await.ok();

    let user_message = request
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "No message provided".to_string());

    Json(json!({
        "message": format!("Hello from taskd! I received: \"{user_message}\""),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
