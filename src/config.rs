//! Runtime configuration for the coordination substrate.
//!
//! [`CoreConfig::from_env`] is the only method that should read environment
//! variables; every recognized option has an `EXEC_TEAM_`-prefixed variable
//! and a default, so a process with no environment configured at all still
//! boots with sane values.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Target chunk length in characters for document splitting.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks, in characters.
    pub chunk_overlap: usize,
    /// Identifier of the embedding backend in use (informational; the
    /// backend itself is an external collaborator).
    pub embedding_model: String,
    /// Fixed vector width the vector store expects.
    pub embedding_dimensions: usize,
    /// Ring-buffer size for the message bus's global history.
    pub message_history_capacity: usize,
    /// Minimum normalized delegation score to avoid the Director fallback.
    pub delegation_threshold: f64,
    /// Maximum re-delegation chain depth.
    pub max_delegation_depth: u32,
    /// Worker pool size for the request coordinator.
    pub worker_pool_size: usize,
    /// Per-request timeout for the LLM collaborator.
    pub llm_request_timeout: Duration,
    /// Per-request timeout for the embedding collaborator.
    pub embedding_request_timeout: Duration,
    /// Flush the embedding cache to disk every N insertions.
    pub embedding_cache_flush_every: usize,
    /// Root directory the retrieval index persists under.
    pub persist_directory: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            embedding_model: "default".to_string(),
            embedding_dimensions: 256,
            message_history_capacity: 10_000,
            delegation_threshold: 0.4,
            max_delegation_depth: 3,
            worker_pool_size: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            llm_request_timeout: Duration::from_secs(120),
            embedding_request_timeout: Duration::from_secs(30),
            embedding_cache_flush_every: 100,
            persist_directory: PathBuf::from("./kb"),
        }
    }
}

impl CoreConfig {
    /// Load configuration from `EXEC_TEAM_*` environment variables,
    /// falling back to [`CoreConfig::default`] for anything unset or
    /// unparsable. This is the only function in the crate that reads
    /// the process environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chunk_size: env_usize("EXEC_TEAM_CHUNK_SIZE", defaults.chunk_size),
            chunk_overlap: env_usize("EXEC_TEAM_CHUNK_OVERLAP", defaults.chunk_overlap),
            embedding_model: std::env::var("EXEC_TEAM_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dimensions: env_usize(
                "EXEC_TEAM_EMBEDDING_DIMENSIONS",
                defaults.embedding_dimensions,
            ),
            message_history_capacity: env_usize(
                "EXEC_TEAM_MESSAGE_HISTORY_CAPACITY",
                defaults.message_history_capacity,
            ),
            delegation_threshold: env_f64(
                "EXEC_TEAM_DELEGATION_THRESHOLD",
                defaults.delegation_threshold,
            ),
            max_delegation_depth: env_u32(
                "EXEC_TEAM_MAX_DELEGATION_DEPTH",
                defaults.max_delegation_depth,
            ),
            worker_pool_size: env_usize("EXEC_TEAM_WORKER_POOL_SIZE", defaults.worker_pool_size),
            llm_request_timeout: Duration::from_secs(env_u64(
                "EXEC_TEAM_LLM_REQUEST_TIMEOUT_SECONDS",
                defaults.llm_request_timeout.as_secs(),
            )),
            embedding_request_timeout: Duration::from_secs(env_u64(
                "EXEC_TEAM_EMBEDDING_REQUEST_TIMEOUT_SECONDS",
                defaults.embedding_request_timeout.as_secs(),
            )),
            embedding_cache_flush_every: env_usize(
                "EXEC_TEAM_EMBEDDING_CACHE_FLUSH_EVERY",
                defaults.embedding_cache_flush_every,
            ),
            persist_directory: std::env::var("EXEC_TEAM_PERSIST_DIRECTORY")
                .map(PathBuf::from)
                .unwrap_or(defaults.persist_directory),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
