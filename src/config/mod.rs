use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

const DEFAULT_PORT: u16 = 4310;
const DEFAULT_MAX_INSTANCES: usize = 10;
const DEFAULT_LOG_LEVEL: &str = "info";

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_data_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".taskd"),
        None => PathBuf::from(".taskd"),
    }
}

// ─── FunctionsConfig ─────────────────────────────────────────────────────────

/// Function host configuration (`[functions]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FunctionsConfig {
    /// Maximum concurrent callable invocations. A cost control, not a
    /// correctness constraint; requests beyond the limit queue.
    pub max_instances: usize,
}

impl Default for FunctionsConfig {
    fn default() -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
        }
    }
}

// ─── TaskdConfig ─────────────────────────────────────────────────────────────

/// Host configuration, loaded from `config.toml` in the data directory with
/// CLI-flag/env overrides applied on top.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskdConfig {
    /// HTTP port for the REST surface and the function endpoints.
    pub port: u16,
    /// Bind address (default: 127.0.0.1; use 0.0.0.0 for LAN access).
    pub bind_address: String,
    /// Data directory for config and the SQLite database.
    pub data_dir: PathBuf,
    /// Log filter (trace, debug, info, warn, error).
    pub log_level: String,
    pub functions: FunctionsConfig,
}

impl Default for TaskdConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: default_bind_address(),
            data_dir: default_data_dir(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            functions: FunctionsConfig::default(),
        }
    }
}

impl TaskdConfig {
    /// Resolve the effective configuration: file values from
    /// `<data_dir>/config.toml` (when present), then explicit overrides.
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log_level: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let mut config = Self::load(&data_dir.join("config.toml"));
        config.data_dir = data_dir;
        if let Some(port) = port {
            config.port = port;
        }
        if let Some(log_level) = log_level {
            config.log_level = log_level;
        }
        if let Some(bind_address) = bind_address {
            config.bind_address = bind_address;
        }
        config
    }

    /// Parse a config file, falling back to defaults on a missing or
    /// malformed file (malformed files are logged, not fatal).
    pub fn load(path: &Path) -> Self {
        let Ok(raw) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), "ignoring malformed config file: {e}");
                Self::default()
            }
        }
    }

    /// Base URL of the HTTP surface, as reachable by local clients.
    pub fn base_url(&self) -> String {
        let host = if self.bind_address == "0.0.0.0" {
            "127.0.0.1"
        } else {
            &self.bind_address
        };
        format!("http://{}:{}", host, self.port)
    }
}
