//! Presentation binding between the task store and an embedding UI.
//!
//! The UI-facing contract is a plain state struct published through a
//! `tokio::sync::watch` channel: observers hold a receiver and re-render on
//! every change. Nothing here blocks — every operation is submit-and-forget
//! with failures surfacing asynchronously into `error_message`.

use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::watch;

use crate::store::{Subscription, Task, TaskStore};

/// Snapshot of everything the UI renders.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    /// Ordered as delivered by the last notification; never re-sorted here.
    pub tasks: Vec<Task>,
    /// True from construction until the first notification (success or
    /// error) arrives; never re-asserted afterwards.
    pub is_loading: bool,
    pub error_message: String,
    pub function_response: String,
}

pub struct TaskViewModel {
    store: TaskStore,
    state_tx: watch::Sender<ViewState>,
    subscription: Subscription,
    http: Client,
    functions_base: String,
}

impl TaskViewModel {
    /// Construct the binding and immediately open the live subscription.
    ///
    /// `functions_base` is the base URL of the function host, e.g.
    /// `http://127.0.0.1:4310`, used by [`call_hello_world`].
    ///
    /// [`call_hello_world`]: TaskViewModel::call_hello_world
    pub fn new(store: TaskStore, functions_base: String) -> Self {
        let (state_tx, _) = watch::channel(ViewState {
            is_loading: true,
            ..Default::default()
        });

        // The subscription task holds only the sender, never the view
        // model itself, so teardown is a plain cancellation.
        let change_tx = state_tx.clone();
        let error_tx = state_tx.clone();
        let subscription = store.subscribe(
            move |tasks| {
                change_tx.send_modify(|state| {
                    state.is_loading = false;
                    state.tasks = tasks;
                });
            },
            move |message| {
                error_tx.send_modify(|state| {
                    state.is_loading = false;
                    state.error_message = message;
                });
            },
        );

        Self {
            store,
            state_tx,
            subscription,
            http: Client::new(),
            functions_base,
        }
    }

    /// Observe state changes. Each receiver sees every published update.
    pub fn state(&self) -> watch::Receiver<ViewState> {
        self.state_tx.subscribe()
    }

    pub fn add_task(&self, title: &str) {
        let tx = self.state_tx.clone();
        self.store.create(title, move |e| {
            tx.send_modify(|state| state.error_message = format!("Error adding task: {e}"));
        });
    }

    pub fn toggle_completion(&self, task: &Task) {
        let tx = self.state_tx.clone();
        self.store
            .set_completed(&task.id, !task.is_completed, move |e| {
                tx.send_modify(|state| state.error_message = format!("Error updating task: {e}"));
            });
    }

    pub fn delete_task(&self, id: &str) {
        let tx = self.state_tx.clone();
        self.store.delete(id, move |e| {
            tx.send_modify(|state| state.error_message = format!("Error deleting task: {e}"));
        });
    }

    /// Invoke the `helloWorld` callable and surface its reply in
    /// `function_response`.
    pub fn call_hello_world(&self) {
        let tx = self.state_tx.clone();
        tx.send_modify(|state| state.function_response = "Calling function...".to_string());

        let http = self.http.clone();
        let url = format!("{}/functions/helloWorld", self.functions_base);
        tokio::spawn(async move {
            let result = async {
                let response = http
                    .post(&url)
                    .json(&json!({ "message": "Hello from the task app" }))
                    .send()
                    .await?;
                let body: Value = response.json().await?;
                anyhow::Ok(body)
            }
            .await;

            let text = match result {
                Ok(body) => {
                    let mut text = String::new();
                    if let Some(message) = body.get("message").and_then(Value::as_str) {
                        text.push_str(message);
                    }
                    if let Some(timestamp) = body.get("timestamp").and_then(Value::as_str) {
                        if !text.is_empty() {
                            text.push('\n');
                        }
                        text.push_str(&format!("Received at: {timestamp}"));
                    }
                    if text.is_empty() {
                        format!("Function returned: {body}")
                    } else {
                        text
                    }
                }
                Err(e) => format!("Error: {e:#}"),
            };
            tx.send_modify(|state| state.function_response = text);
        });
    }

    /// Detach the live subscription. Idempotent; also happens when the view
    /// model is dropped. After teardown, pending callbacks are no-ops.
    pub fn shutdown(&self) {
        self.subscription.cancel();
    }
}
