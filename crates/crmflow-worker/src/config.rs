// Worker configuration

use std::time::Duration;

use uuid::Uuid;

/// Polling configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    /// Minimum poll interval (when work was found)
    pub min_interval: Duration,

    /// Maximum poll interval (when idle)
    pub max_interval: Duration,

    /// Backoff multiplier when nothing was due
    pub backoff_multiplier: f64,

    /// Maximum executions and enrollments picked up per poll
    pub batch_size: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(15),
            backoff_multiplier: 1.5,
            batch_size: 50,
        }
    }
}

impl PollerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup, applying the same clamps as the builders
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str| {
            get(key)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        let min_interval = millis("POLL_MIN_INTERVAL_MS").unwrap_or(defaults.min_interval);
        let max_interval = millis("POLL_MAX_INTERVAL_MS")
            .unwrap_or(defaults.max_interval)
            .max(min_interval);

        Self::new()
            .with_min_interval(min_interval)
            .with_max_interval(max_interval)
            .with_backoff_multiplier(
                get("POLL_BACKOFF_MULTIPLIER")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.backoff_multiplier),
            )
            .with_batch_size(
                get("POLL_BATCH_SIZE")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.batch_size),
            )
    }
}

/// Configuration for the standalone worker binary
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker ID (unique identifier for this worker instance)
    pub worker_id: String,
    pub database_url: String,
    pub max_connections: u32,
    /// Apply migrations on startup
    pub run_migrations: bool,
    pub poller: PollerConfig,
}

impl WorkerConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set for the worker"))?;

        let worker_id =
            std::env::var("WORKER_ID").unwrap_or_else(|_| format!("worker-{}", Uuid::now_v7()));

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let run_migrations = std::env::var("RUN_MIGRATIONS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            worker_id,
            database_url,
            max_connections,
            run_migrations,
            poller: PollerConfig::from_env(),
        })
    }
}
