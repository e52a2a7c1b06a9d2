//! Store client tests: lenient decoding, ordering, mutations, and the
//! live-subscription lifecycle.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use taskd::{config::TaskdConfig, storage::Storage, store::Task, AppContext};
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

#[tokio::test]
async fn documents_missing_fields_decode_with_defaults() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;

    ctx.storage
        .put_document("tasks", "only-title", &json!({ "title": "groceries" }))
        .await
        .unwrap();
    ctx.storage
        .put_document("tasks", "only-flag", &json!({ "isCompleted": true }))
        .await
        .unwrap();

    let tasks = ctx.task_store().snapshot().await.unwrap();
    assert_eq!(tasks.len(), 2);

    let only_title = tasks.iter().find(|t| t.id == "only-title").unwrap();
    assert_eq!(only_title.title, "groceries");
    assert!(!only_title.is_completed);

    let only_flag = tasks.iter().find(|t| t.id == "only-flag").unwrap();
    assert_eq!(only_flag.title, "");
    assert!(only_flag.is_completed);
}

#[tokio::test]
async fn corrupt_documents_are_skipped_silently() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;

    sqlx::query(
        "INSERT INTO documents (collection, id, data, updated_at) VALUES ('tasks', 'bad', 'not json', '')",
    )
    .execute(&ctx.storage.pool())
    .await
    .unwrap();
    ctx.storage
        .put_document("tasks", "good", &json!({ "title": "ok" }))
        .await
        .unwrap();

    let tasks = ctx.task_store().snapshot().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "good");
}

#[tokio::test]
async fn snapshot_orders_by_created_at_descending_across_representations() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;

    ctx.storage
        .put_document(
            "tasks",
            "oldest",
            &json!({ "title": "a", "createdAt": "2026-08-06T10:00:00Z" }),
        )
        .await
        .unwrap();
    // Epoch milliseconds, as another backend would have written it.
    ctx.storage
        .put_document(
            "tasks",
            "middle",
            &json!({ "title": "b", "createdAt": 1_786_014_000_000_i64 }), // 2026-08-06T11:00:00Z
        )
        .await
        .unwrap();
    ctx.storage
        .put_document(
            "tasks",
            "newest",
            &json!({ "title": "c", "createdAt": "2026-08-06T12:00:00Z" }),
        )
        .await
        .unwrap();
    // No createdAt at all: sorts last.
    ctx.storage
        .put_document("tasks", "dateless", &json!({ "title": "d" }))
        .await
        .unwrap();

    let tasks = ctx.task_store().snapshot().await.unwrap();
    let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["newest", "middle", "oldest", "dateless"]);
}

#[tokio::test]
async fn created_task_lists_first() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;
    let store = ctx.task_store();

    store.create_task("first").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = store.create_task("second").await.unwrap();

    let tasks = store.snapshot().await.unwrap();
    assert_eq!(tasks[0].id, second.id);
    assert_eq!(tasks[0].title, "second");
}

#[tokio::test]
async fn toggling_completion_twice_restores_original_state() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;
    let store = ctx.task_store();

    let task = store.create_task("flip me").await.unwrap();
    assert!(!task.is_completed);

    store.set_task_completed(&task.id, true).await.unwrap();
    store.set_task_completed(&task.id, false).await.unwrap();

    let tasks = store.snapshot().await.unwrap();
    assert!(!tasks[0].is_completed);
    // The partial update left the other fields alone.
    assert_eq!(tasks[0].title, "flip me");
    assert_eq!(tasks[0].created_at, task.created_at);
}

#[tokio::test]
async fn mutating_nonexistent_ids_is_a_quiet_no_op() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;
    let store = ctx.task_store();

    store.set_task_completed("ghost", true).await.unwrap();
    assert!(ctx
        .storage
        .get_document("tasks", "ghost")
        .await
        .unwrap()
        .is_none());

    store.delete_task("ghost").await.unwrap();
}

#[tokio::test]
async fn subscription_delivers_initial_and_change_snapshots() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;
    let store = ctx.task_store();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Vec<Task>>();
    let sub = store.subscribe(
        move |tasks| {
            let _ = tx.send(tasks);
        },
        |_: String| {},
    );

    // Initial load counts as a notification even with no mutation.
    let initial = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("initial snapshot")
        .unwrap();
    assert!(initial.is_empty());

    store.create_task("first").await.unwrap();
    let after_create = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("change snapshot")
        .unwrap();
    assert_eq!(after_create.len(), 1);
    assert_eq!(after_create[0].title, "first");

    // Cancellation is idempotent.
    sub.cancel();
    sub.cancel();
    assert!(sub.is_cancelled());

    // No further deliveries after cancellation.
    store.create_task("second").await.unwrap();
    match timeout(Duration::from_millis(200), rx.recv()).await {
        Ok(Some(_)) => panic!("delivered a snapshot after cancellation"),
        _ => {}
    }
}

#[tokio::test]
async fn subscription_surfaces_query_failures_as_errors() {
    let dir = TempDir::new().unwrap();
    let ctx = make_ctx(&dir).await;
    let store = ctx.task_store();

    ctx.storage.pool().close().await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let _sub = store.subscribe(
        |_: Vec<Task>| {},
        move |message| {
            let _ = tx.send(message);
        },
    );

    let message = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("error delivery")
        .unwrap();
    assert!(message.contains("Error fetching tasks"));
}
