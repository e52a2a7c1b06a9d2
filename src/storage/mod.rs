use anyhow::{Context as _, Result};
use chrono::Utc;
use serde_json::Value;
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the host indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

/// A stored document: string key plus a JSON object of fields.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentRow {
    pub id: String,
    /// JSON-encoded field map. Not validated on write; readers decode
    /// leniently.
    pub data: String,
    pub updated_at: String,
}

/// SQLite-backed document store. The durable copy of every collection;
/// change notification is layered on top by the store client.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("taskd.db");
        let opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true)
                .log_slow_statements(log::LevelFilter::Warn, std::time::Duration::from_millis(250));

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("src/storage/migrations")
            .run(pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ─── Documents ───────────────────────────────────────────────────────────

    /// Insert or fully replace a document.
    pub async fn put_document(&self, collection: &str, id: &str, fields: &Value) -> Result<()> {
        let pool = self.pool.clone();
        let data = fields.to_string();
        let now = Utc::now().to_rfc3339();
        with_timeout(async move {
            sqlx::query(
                "INSERT INTO documents (collection, id, data, updated_at) VALUES (?, ?, ?, ?) \
                 ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            )
            .bind(collection)
            .bind(id)
            .bind(data)
            .bind(now)
            .execute(&pool)
            .await
            .context("failed to write document")?;
            Ok(())
        })
        .await
    }

    /// Merge `patch` keys into an existing document's fields.
    ///
    /// Returns `false` without error when the document does not exist —
    /// partial updates against a deleted document are a no-op.
    pub async fn merge_fields(&self, collection: &str, id: &str, patch: &Value) -> Result<bool> {
        let existing = match self.get_document(collection, id).await? {
            Some(row) => row,
            None => return Ok(false),
        };

        let mut data: Value =
            serde_json::from_str(&existing.data).unwrap_or_else(|_| Value::Object(Default::default()));
        if !data.is_object() {
            data = Value::Object(Default::default());
        }
        if let (Some(obj), Some(patch_obj)) = (data.as_object_mut(), patch.as_object()) {
            for (key, value) in patch_obj {
                obj.insert(key.clone(), value.clone());
            }
        }

        let pool = self.pool.clone();
        let data = data.to_string();
        let now = Utc::now().to_rfc3339();
        let collection = collection.to_string();
        let id = id.to_string();
        with_timeout(async move {
            sqlx::query(
                "UPDATE documents SET data = ?, updated_at = ? WHERE collection = ? AND id = ?",
            )
            .bind(data)
            .bind(now)
            .bind(collection)
            .bind(id)
            .execute(&pool)
            .await
            .context("failed to update document")?;
            Ok(true)
        })
        .await
    }

    /// Delete a document. Returns `false` when no row existed — deleting a
    /// nonexistent id is not an error.
    pub async fn delete_document(&self, collection: &str, id: &str) -> Result<bool> {
        let pool = self.pool.clone();
        let collection = collection.to_string();
        let id = id.to_string();
        with_timeout(async move {
            let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .execute(&pool)
                .await
                .context("failed to delete document")?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    pub async fn get_document(&self, collection: &str, id: &str) -> Result<Option<DocumentRow>> {
        let pool = self.pool.clone();
        let collection = collection.to_string();
        let id = id.to_string();
        with_timeout(async move {
            let row = sqlx::query_as::<_, DocumentRow>(
                "SELECT id, data, updated_at FROM documents WHERE collection = ? AND id = ?",
            )
            .bind(collection)
            .bind(id)
            .fetch_optional(&pool)
            .await
            .context("failed to read document")?;
            Ok(row)
        })
        .await
    }

    /// All documents in a collection. Unordered; callers that need the
    /// createdAt ordering sort after decoding.
    pub async fn list_documents(&self, collection: &str) -> Result<Vec<DocumentRow>> {
        let pool = self.pool.clone();
        let collection = collection.to_string();
        with_timeout(async move {
            let rows = sqlx::query_as::<_, DocumentRow>(
                "SELECT id, data, updated_at FROM documents WHERE collection = ? ORDER BY id",
            )
            .bind(collection)
            .fetch_all(&pool)
            .await
            .context("failed to list documents")?;
            Ok(rows)
        })
        .await
    }
}
