use std::time::Duration;

/// Where jobs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Single-process store; only useful when processors run inside the
    /// API server.
    Memory,
}

/// Processor configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of processor loops to run.
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub max_idle_backoff: Duration,
    pub store_backend: StoreBackend,
    /// Required for [`StoreBackend::Postgres`].
    pub database_url: Option<String>,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default    |
    /// |------------------------------|------------|
    /// | `WORKER_CONCURRENCY`         | `2`        |
    /// | `WORKER_POLL_INTERVAL_MS`    | `1000`     |
    /// | `WORKER_MAX_IDLE_BACKOFF_MS` | `10000`    |
    /// | `STORE_BACKEND`              | `postgres` |
    /// | `DATABASE_URL`               | unset      |
    pub fn from_env() -> Self {
        let concurrency: usize = std::env::var("WORKER_CONCURRENCY")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("WORKER_CONCURRENCY must be a valid usize");

        let poll_interval_ms: u64 = std::env::var("WORKER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("WORKER_POLL_INTERVAL_MS must be a valid u64");

        let max_idle_backoff_ms: u64 = std::env::var("WORKER_MAX_IDLE_BACKOFF_MS")
            .unwrap_or_else(|_| "10000".into())
            .parse()
            .expect("WORKER_MAX_IDLE_BACKOFF_MS must be a valid u64");

        let store_backend = match std::env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".into())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => panic!("STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        };

        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            panic!("DATABASE_URL must be set when STORE_BACKEND is 'postgres'");
        }

        Self {
            concurrency,
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_idle_backoff: Duration::from_millis(max_idle_backoff_ms),
            store_backend,
            database_url,
        }
    }
}
