//! Creation trigger: handlers invoked once per newly created task document.
//!
//! The dispatcher subscribes to the change broadcaster and fans each
//! `document.created` event in the task collection out to the registered
//! handlers. Fire-and-observe — no retries, no result returned to anyone.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::events::parse_document_event;
use crate::store::{decode_timestamp, TASKS_COLLECTION};
use crate::AppContext;

/// A task-creation event as delivered to trigger handlers.
#[derive(Debug, Clone)]
pub struct CreateEvent {
    pub task_id: String,
    /// The created document's fields, as written.
    pub fields: Value,
}

#[async_trait]
pub trait TriggerHandler: Send + Sync {
    fn name(&self) -> &str;
    async fn on_create(&self, event: &CreateEvent);
}

/// Built-in handler: logs diagnostics about each new task.
pub struct LogNewTask;

#[async_trait]
impl TriggerHandler for LogNewTask {
    fn name(&self) -> &str {
        "logNewTask"
    }

    async fn on_create(&self, event: &CreateEvent) {
        info!("New task created with ID: {}", event.task_id);

        let title = event
            .fields
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("");
        info!("Task title: {title}");

        if let Some(raw) = event.fields.get("createdAt") {
            match decode_timestamp(raw) {
                Some(created_at) => info!("Task created at: {created_at}"),
                None => warn!("Task has an unreadable createdAt value: {raw}"),
            }
        }
    }
}

/// The handler set the host registers on startup.
pub fn default_handlers() -> Vec<Arc<dyn TriggerHandler>> {
    vec![Arc::new(LogNewTask)]
}

/// Spawn the dispatcher task. Runs until the broadcaster is dropped.
pub fn spawn_dispatcher(
    ctx: Arc<AppContext>,
    handlers: Vec<Arc<dyn TriggerHandler>>,
) -> JoinHandle<()> {
    let mut rx = ctx.broadcaster.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(raw) => {
                    let Some(event) = parse_document_event(&raw) else {
                        continue;
                    };
                    if !event.is_created() || event.collection != TASKS_COLLECTION {
                        continue;
                    }
                    let Some(fields) = event.fields else {
                        info!("No data associated with the event");
                        continue;
                    };
                    let create_event = CreateEvent {
                        task_id: event.id,
                        fields,
                    };
                    for handler in &handlers {
                        tracing::debug!(handler = handler.name(), task_id = %create_event.task_id, "dispatching creation trigger");
                        handler.on_create(&create_event).await;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    // Triggers for the missed creations are simply lost, the
                    // same as a function runtime shedding events under load.
                    warn!(missed = n, "trigger dispatcher lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
