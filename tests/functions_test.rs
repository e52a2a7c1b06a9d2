//! Function-layer tests: spins up the HTTP surface on a random port and
//! drives it the way a client app would.

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use taskd::{
    cli::client::TaskdClient,
    config::TaskdConfig,
    functions::trigger::{self, CreateEvent, TriggerHandler},
    rest,
    storage::Storage,
    AppContext,
};
use tempfile::TempDir;
use tokio::time::timeout;

async fn make_ctx(dir: &TempDir) -> Arc<AppContext> {
    let config = TaskdConfig::new(
        Some(0),
        Some(dir.path().to_path_buf()),
        Some("error".to_string()),
        None,
    );
    let storage = Storage::new(dir.path()).await.unwrap();
    Arc::new(AppContext::new(config, storage))
}

/// Serve the router on a random port; returns the base URL.
async fn spawn_server(ctx: Arc<AppContext>) -> String {
    let router = rest::build_router(ctx);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn hello_world_substitutes_placeholder_for_missing_message() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(make_ctx(&dir).await).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/functions/helloWorld"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("No message provided"));

    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn hello_world_echoes_the_message() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(make_ctx(&dir).await).await;

    let body: Value = reqwest::Client::new()
        .post(format!("{base}/functions/helloWorld"))
        .json(&json!({ "message": "hi" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["message"].as_str().unwrap().contains("\"hi\""));
}

#[tokio::test]
async fn get_all_tasks_returns_empty_list_on_empty_collection() {
    let dir = TempDir::new().unwrap();
    let base = spawn_server(make_ctx(&dir).await).await;

    let response = reqwest::get(format!("{base}/functions/getAllTasks"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["tasks"], json!([]));
}

#[tokio::test]
async fn get_all_tasks_returns_raw_documents_newest_first() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;
    let store = ctx.task_store();
    let base = spawn_server(ctx.clone()).await;

    store.create_task("older").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let newer = store.create_task("newer").await.unwrap();

    let body: Value = reqwest::get(format!("{base}/functions/getAllTasks"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["id"], json!(newer.id));
    assert_eq!(tasks[0]["title"], json!("newer"));
    // Raw stored fields, not the decoded projection.
    assert!(tasks[0]["createdAt"].is_string());
    assert_eq!(tasks[0]["isCompleted"], json!(false));
}

#[tokio::test]
async fn get_all_tasks_collapses_failures_to_one_error_class() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;
    let base = spawn_server(ctx.clone()).await;

    ctx.storage.pool().close().await;

    let response = reqwest::get(format!("{base}/functions/getAllTasks"))
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("Something went wrong"));
}

struct CountingHandler {
    hits: Arc<AtomicUsize>,
}

#[async_trait]
impl TriggerHandler for CountingHandler {
    fn name(&self) -> &str {
        "counting"
    }

    async fn on_create(&self, _event: &CreateEvent) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn creation_trigger_fires_once_per_new_task() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;
    let store = ctx.task_store();

    let hits = Arc::new(AtomicUsize::new(0));
    let _dispatcher = trigger::spawn_dispatcher(
        ctx.clone(),
        vec![Arc::new(CountingHandler { hits: hits.clone() })],
    );

    store.create_task("one").await.unwrap();
    store.create_task("two").await.unwrap();
    // Updates and deletes must not fire the creation trigger.
    let task = store.create_task("three").await.unwrap();
    store.set_task_completed(&task.id, true).await.unwrap();
    store.delete_task(&task.id).await.unwrap();

    timeout(Duration::from_secs(5), async {
        while hits.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("trigger handler invoked for each creation");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn rest_surface_round_trips_through_the_cli_client() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;
    let base = spawn_server(ctx).await;
    let client = TaskdClient::new(base);

    let id = client.add("buy milk").await.unwrap();
    assert!(!id.is_empty());

    let tasks = client.list().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "buy milk");
    assert!(!tasks[0].is_completed);

    client.set_completed(&id, true).await.unwrap();
    let tasks = client.list().await.unwrap();
    assert!(tasks[0].is_completed);

    client.remove(&id).await.unwrap();
    assert!(client.list().await.unwrap().is_empty());

    // Mutations against a deleted id stay quiet.
    client.set_completed(&id, false).await.unwrap();
    client.remove(&id).await.unwrap();

    let reply = client.hello(None).await.unwrap();
    assert!(reply["message"]
        .as_str()
        .unwrap()
        .contains("No message provided"));
}

#[tokio::test]
async fn event_stream_opens_with_a_snapshot() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;
    ctx.task_store().create_task("pre-existing").await.unwrap();
    let base = spawn_server(ctx).await;
    let client = TaskdClient::new(base);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let _ = client
            .watch(move |data| {
                let _ = tx.send(data.to_string());
            })
            .await;
    });

    let first = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("initial snapshot event")
        .unwrap();
    let snapshot: Value = serde_json::from_str(&first).unwrap();
    assert_eq!(snapshot["tasks"][0]["title"], json!("pre-existing"));
}
