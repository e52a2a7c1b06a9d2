use serde_json::Value;
use tokio::sync::broadcast;

/// Broadcasts document change notifications to all in-process subscribers:
/// live-query subscriptions, the SSE bridge, and the trigger dispatcher.
///
/// Notifications are JSON strings of the form
/// `{"method": "document.created", "params": {...}}` so every consumer sees
/// the same wire shape the SSE bridge forwards to remote clients.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Send a notification to all subscribers.
    pub fn broadcast(&self, method: &str, params: Value) {
        let notification = serde_json::json!({
            "method": method,
            "params": params
        });
        // Ignore errors — no subscribers is fine
        let _ = self
            .tx
            .send(serde_json::to_string(&notification).unwrap_or_default());
    }

    /// Subscribe to all broadcast events.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

// ─── Document events ─────────────────────────────────────────────────────────

/// A parsed `document.*` notification.
#[derive(Debug, Clone)]
pub struct DocumentEvent {
    /// `document.created`, `document.updated`, or `document.deleted`.
    pub method: String,
    pub collection: String,
    pub id: String,
    /// Document fields for created/updated events; absent for deletes.
    pub fields: Option<Value>,
}

impl DocumentEvent {
    pub fn is_created(&self) -> bool {
        self.method == "document.created"
    }
}

/// Parse a raw broadcast string into a document event.
///
/// Returns `None` for notifications that are not `document.*` methods or
/// that fail to parse — consumers skip those.
pub fn parse_document_event(raw: &str) -> Option<DocumentEvent> {
    let v: Value = serde_json::from_str(raw).ok()?;
    let method = v.get("method")?.as_str()?;
    if !method.starts_with("document.") {
        return None;
    }
    let params = v.get("params")?;
    Some(DocumentEvent {
        method: method.to_string(),
        collection: params.get("collection")?.as_str()?.to_string(),
        id: params.get("id")?.as_str()?.to_string(),
        fields: params.get("fields").cloned(),
    })
}
