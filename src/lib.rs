pub mod cli;
pub mod config;
pub mod events;
pub mod functions;
pub mod rest;
pub mod storage;
pub mod store;
pub mod viewmodel;

use std::sync::Arc;
use tokio::sync::Semaphore;

use config::TaskdConfig;
use events::EventBroadcaster;
use storage::Storage;
use store::TaskStore;

/// Shared application state passed to every route handler and background
/// task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<TaskdConfig>,
    pub storage: Arc<Storage>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub started_at: std::time::Instant,
    /// Bounds concurrent callable invocations (`functions.max_instances`).
    pub functions_limit: Arc<Semaphore>,
}

impl AppContext {
    pub fn new(config: TaskdConfig, storage: Storage) -> Self {
        let functions_limit = Arc::new(Semaphore::new(config.functions.max_instances));
        Self {
            config: Arc::new(config),
            storage: Arc::new(storage),
            broadcaster: Arc::new(EventBroadcaster::new()),
            started_at: std::time::Instant::now(),
            functions_limit,
        }
    }

    /// A store client bound to this host's storage and broadcaster.
    pub fn task_store(&self) -> TaskStore {
        TaskStore::new(self.storage.clone(), self.broadcaster.clone())
    }
}
