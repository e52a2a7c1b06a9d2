//! Lightweight HTTP client for CLI subcommands.
//!
//! CLI subcommands (`taskd add`, `taskd list`, etc.) use this to talk to a
//! running host over its REST surface.

use anyhow::{bail, Context as _, Result};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;

use crate::store::Task;

/// A short-lived client for CLI-to-host calls.
pub struct TaskdClient {
    base_url: String,
    http: reqwest::Client,
}

impl TaskdClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    async fn expect_ok(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .context("host returned a non-JSON response")?;
        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            bail!("host error ({status}): {message}");
        }
        Ok(body)
    }

    pub async fn list(&self) -> Result<Vec<Task>> {
        let response = self
            .http
            .get(format!("{}/api/v1/tasks", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("failed to reach host — is `taskd serve` running?")?;
        let body = Self::expect_ok(response).await?;
        let tasks = serde_json::from_value(body["tasks"].clone())
            .context("unexpected task list shape")?;
        Ok(tasks)
    }

    pub async fn add(&self, title: &str) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/api/v1/tasks", self.base_url))
            .timeout(Duration::from_secs(5))
            .json(&json!({ "title": title }))
            .send()
            .await
            .context("failed to reach host")?;
        let body = Self::expect_ok(response).await?;
        Ok(body["id"].as_str().unwrap_or_default().to_string())
    }

    pub async fn set_completed(&self, id: &str, value: bool) -> Result<()> {
        let response = self
            .http
            .patch(format!("{}/api/v1/tasks/{id}", self.base_url))
            .timeout(Duration::from_secs(5))
            .json(&json!({ "isCompleted": value }))
            .send()
            .await
            .context("failed to reach host")?;
        Self::expect_ok(response).await?;
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/api/v1/tasks/{id}", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("failed to reach host")?;
        Self::expect_ok(response).await?;
        Ok(())
    }

    pub async fn hello(&self, message: Option<&str>) -> Result<Value> {
        let body = match message {
            Some(message) => json!({ "message": message }),
            None => json!({}),
        };
        let response = self
            .http
            .post(format!("{}/functions/helloWorld", self.base_url))
            .timeout(Duration::from_secs(5))
            .json(&body)
            .send()
            .await
            .context("failed to reach host")?;
        Self::expect_ok(response).await
    }

    /// Consume the SSE live-query stream, invoking `on_event` with the data
    /// payload of each event. Runs until the stream ends.
    pub async fn watch(&self, mut on_event: impl FnMut(&str)) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/api/v1/tasks/events", self.base_url))
            .send()
            .await
            .context("failed to reach host")?
            .error_for_status()
            .context("event stream rejected")?;

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("event stream interrupted")?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim_end_matches('\r').to_string();
                buffer.drain(..=pos);
                if let Some(data) = line.strip_prefix("data: ") {
                    on_event(data);
                }
            }
        }
        Ok(())
    }
}
