// rest/sse.rs — live-query bridge.
//
// GET /api/v1/tasks/events
//
// Streams the task collection as Server-Sent Events: one `snapshot` event
// with the full ordered list on connect, then another after every change.
// Remote clients get the same full-list-replacement semantics as in-process
// subscribers.

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures_util::stream;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::events::parse_document_event;
use crate::store::{TaskStore, TASKS_COLLECTION};
use crate::AppContext;

pub async fn task_events_sse(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    // Register before the initial snapshot so no change slips between them.
    let rx = ctx.broadcaster.subscribe();
    let store = ctx.task_store();

    struct StreamState {
        rx: tokio::sync::broadcast::Receiver<String>,
        store: TaskStore,
        sent_initial: bool,
    }

    let s = stream::unfold(
        StreamState {
            rx,
            store,
            sent_initial: false,
        },
        move |mut state| async move {
            if !state.sent_initial {
                state.sent_initial = true;
                return Some((
                    Ok::<Event, std::convert::Infallible>(snapshot_event(&state.store).await),
                    state,
                ));
            }
            loop {
                match state.rx.recv().await {
                    Ok(raw) => {
                        let Some(event) = parse_document_event(&raw) else {
                            continue;
                        };
                        if event.collection != TASKS_COLLECTION {
                            continue;
                        }
                        return Some((Ok(snapshot_event(&state.store).await), state));
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                        // Collapse the backlog into one fresh snapshot.
                        return Some((Ok(snapshot_event(&state.store).await), state));
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
                }
            }
        },
    );

    Sse::new(s).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// A failed query surfaces as an `error` event; the client keeps whatever
/// snapshot it already has.
async fn snapshot_event(store: &TaskStore) -> Event {
    match store.snapshot().await {
        Ok(tasks) => Event::default()
            .event("snapshot")
            .data(json!({ "tasks": tasks }).to_string()),
        Err(e) => Event::default()
            .event("error")
            .data(json!({ "error": format!("Error fetching tasks: {e:#}") }).to_string()),
    }
}
