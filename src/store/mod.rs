//! Task store client: typed CRUD over the `tasks` collection plus live
//! full-list subscriptions driven by the change broadcaster.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::events::{parse_document_event, EventBroadcaster};
use crate::storage::Storage;

pub const TASKS_COLLECTION: &str = "tasks";

// ─── Task model ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a new local task: fresh id, current timestamp, not completed.
    pub fn new(title: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            is_completed: false,
            created_at: Utc::now(),
        }
    }

    /// Document field map for persistence.
    pub fn fields(&self) -> Value {
        json!({
            "title": self.title,
            "isCompleted": self.is_completed,
            "createdAt": self.created_at.to_rfc3339(),
        })
    }

    /// Decode a stored document into a task.
    ///
    /// Lenient by policy: a missing or mistyped `title` decodes to `""`,
    /// a missing or mistyped `isCompleted` to `false`, and an absent or
    /// unreadable `createdAt` to the Unix epoch (which sorts last). A
    /// document whose data is not a JSON object at all yields `None` and is
    /// skipped by callers rather than failing the whole list.
    pub fn from_document(id: &str, data: &str) -> Option<Self> {
        let fields: Value = serde_json::from_str(data).ok()?;
        let obj = fields.as_object()?;
        Some(Self {
            id: id.to_string(),
            title: obj
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            is_completed: obj
                .get("isCompleted")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            created_at: obj
                .get("createdAt")
                .and_then(decode_timestamp)
                .unwrap_or(DateTime::UNIX_EPOCH),
        })
    }
}

/// Normalize a stored timestamp value.
///
/// Documents written by this client carry RFC 3339 strings; documents
/// written by other backends may carry integer epoch milliseconds. Both
/// normalize here, once, at the store boundary — downstream code only ever
/// sees `DateTime<Utc>`.
pub fn decode_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

// ─── Subscription handle ─────────────────────────────────────────────────────

/// Handle for a live task-list subscription. Cancelling detaches the
/// listener; cancellation is idempotent and also happens on drop.
pub struct Subscription {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Detach the listener. Calling this after a prior cancellation is a
    /// no-op.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.handle.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ─── Store client ────────────────────────────────────────────────────────────

/// Client for the `tasks` collection.
///
/// Reads and writes go to [`Storage`]; every successful mutation is
/// announced on the broadcaster so subscriptions, the SSE bridge, and the
/// trigger dispatcher observe it.
#[derive(Clone)]
pub struct TaskStore {
    storage: Arc<Storage>,
    broadcaster: Arc<EventBroadcaster>,
}

impl TaskStore {
    pub fn new(storage: Arc<Storage>, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            storage,
            broadcaster,
        }
    }

    /// The complete current task list, newest first.
    ///
    /// Ordering key is the normalized `createdAt`; documents that cannot be
    /// decoded at all are skipped.
    pub async fn snapshot(&self) -> Result<Vec<Task>> {
        let rows = self.storage.list_documents(TASKS_COLLECTION).await?;
        let mut tasks: Vec<Task> = rows
            .iter()
            .filter_map(|row| Task::from_document(&row.id, &row.data))
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    /// Open a live query over the task collection.
    ///
    /// `on_change` receives the complete ordered list on initial load and
    /// after every change to the collection; `on_error` receives a
    /// descriptive message when a query fails, leaving previously delivered
    /// state untouched. Call at most once per consumer; use the returned
    /// handle to detach.
    pub fn subscribe<C, E>(&self, on_change: C, on_error: E) -> Subscription
    where
        C: Fn(Vec<Task>) + Send + Sync + 'static,
        E: Fn(String) + Send + Sync + 'static,
    {
        // Register with the broadcaster before the initial query so
        // mutations issued right after subscribing are not lost.
        let mut rx = self.broadcaster.subscribe();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let store = self.clone();

        let handle = tokio::spawn(async move {
            let deliver = |result: Result<Vec<Task>>| {
                // Cancellation checked at callback entry: after teardown
                // every pending delivery is a no-op.
                if flag.load(Ordering::SeqCst) {
                    return;
                }
                match result {
                    Ok(tasks) => on_change(tasks),
                    Err(e) => on_error(format!("Error fetching tasks: {e:#}")),
                }
            };

            deliver(store.snapshot().await);

            loop {
                match rx.recv().await {
                    Ok(raw) => {
                        let Some(event) = parse_document_event(&raw) else {
                            continue;
                        };
                        if event.collection != TASKS_COLLECTION {
                            continue;
                        }
                        deliver(store.snapshot().await);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        // Missed events collapse into one fresh snapshot.
                        debug!(missed = n, "task subscription lagged; resyncing");
                        deliver(store.snapshot().await);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Subscription { cancelled, handle }
    }

    // ─── Mutations ───────────────────────────────────────────────────────────

    /// Create a task with a fresh id and the current timestamp.
    pub async fn create_task(&self, title: &str) -> Result<Task> {
        let task = Task::new(title);
        self.storage
            .put_document(TASKS_COLLECTION, &task.id, &task.fields())
            .await?;
        self.broadcaster.broadcast(
            "document.created",
            json!({ "collection": TASKS_COLLECTION, "id": task.id, "fields": task.fields() }),
        );
        Ok(task)
    }

    /// Partial update of the completion flag. A no-op when the document no
    /// longer exists.
    pub async fn set_task_completed(&self, id: &str, value: bool) -> Result<()> {
        let updated = self
            .storage
            .merge_fields(TASKS_COLLECTION, id, &json!({ "isCompleted": value }))
            .await?;
        if updated {
            self.broadcaster.broadcast(
                "document.updated",
                json!({ "collection": TASKS_COLLECTION, "id": id, "fields": { "isCompleted": value } }),
            );
        }
        Ok(())
    }

    /// Delete a task. Idempotent — a nonexistent id is not an error.
    pub async fn delete_task(&self, id: &str) -> Result<()> {
        let removed = self.storage.delete_document(TASKS_COLLECTION, id).await?;
        if removed {
            self.broadcaster.broadcast(
                "document.deleted",
                json!({ "collection": TASKS_COLLECTION, "id": id }),
            );
        }
        Ok(())
    }

    // ─── Fire-and-forget variants ────────────────────────────────────────────
    //
    // Submit-and-forget forms used by the presentation binding: control
    // returns immediately and failures surface only through the callback.

    pub fn create(&self, title: &str, on_error: impl FnOnce(String) + Send + 'static) {
        let store = self.clone();
        let title = title.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.create_task(&title).await {
                on_error(format!("{e:#}"));
            }
        });
    }

    pub fn set_completed(&self, id: &str, value: bool, on_error: impl FnOnce(String) + Send + 'static) {
        let store = self.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.set_task_completed(&id, value).await {
                on_error(format!("{e:#}"));
            }
        });
    }

    pub fn delete(&self, id: &str, on_error: impl FnOnce(String) + Send + 'static) {
        let store = self.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = store.delete_task(&id).await {
                on_error(format!("{e:#}"));
            }
        });
    }
}
