//! CLI subcommand implementations. Thin printers over [`TaskdClient`].

pub mod client;

use anyhow::Result;
use serde_json::Value;

use client::TaskdClient;

pub async fn add(client: &TaskdClient, title: &str) -> Result<()> {
    let id = client.add(title).await?;
    println!("created task {id}");
    Ok(())
}

pub async fn list(client: &TaskdClient) -> Result<()> {
    let tasks = client.list().await?;
    if tasks.is_empty() {
        println!("no tasks");
        return Ok(());
    }
    for task in tasks {
        let mark = if task.is_completed { "x" } else { " " };
        println!(
            "[{mark}] {}  {}  ({})",
            task.id,
            task.title,
            task.created_at.to_rfc3339()
        );
    }
    Ok(())
}

pub async fn done(client: &TaskdClient, id: &str, undo: bool) -> Result<()> {
    client.set_completed(id, !undo).await?;
    println!("{} {id}", if undo { "reopened" } else { "completed" });
    Ok(())
}

pub async fn rm(client: &TaskdClient, id: &str) -> Result<()> {
    client.remove(id).await?;
    println!("deleted {id}");
    Ok(())
}

pub async fn hello(client: &TaskdClient, message: Option<&str>) -> Result<()> {
    let reply = client.hello(message).await?;
    if let Some(text) = reply.get("message").and_then(Value::as_str) {
        println!("{text}");
    }
    if let Some(timestamp) = reply.get("timestamp").and_then(Value::as_str) {
        println!("Received at: {timestamp}");
    }
    Ok(())
}

pub async fn watch(client: &TaskdClient) -> Result<()> {
    println!("watching tasks (ctrl-c to stop)");
    client
        .watch(|data| {
            println!("{data}");
        })
        .await
}
