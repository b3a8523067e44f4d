use serde::Deserialize;
use std::str::FromStr;

use crate::store::DEFAULT_CAPACITY_BYTES;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Where snapshots come from. `kind = "http"` or `kind = "process"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// JSON status document fetched over HTTP(S).
    Http {
        url: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    /// OS-level status of the server process, by pid or exact name.
    Process {
        pid: Option<u32>,
        process_name: Option<String>,
    },
}

fn default_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// How often to log sampler/store stats at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
    /// Records buffered for /ws/latest (slow clients may lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

fn default_broadcast_capacity() -> usize {
    16
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            stats_log_interval_secs: default_stats_log_interval_secs(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: usize,
}

fn default_capacity_bytes() -> usize {
    DEFAULT_CAPACITY_BYTES
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: default_capacity_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_journal_path")]
    pub path: String,
    /// Records buffered before a journal write.
    #[serde(default = "default_flush_rate")]
    pub flush_rate: u64,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// Cron expression (with seconds field, local time) for VACUUM, e.g. "0 0 3 * * *".
    #[serde(default)]
    pub vacuum_schedule: Option<String>,
    /// VACUUM every N seconds when vacuum_schedule is not set.
    #[serde(default = "default_vacuum_interval_secs")]
    pub vacuum_interval_secs: u64,
}

fn default_journal_path() -> String {
    "data/journal.db".into()
}

fn default_flush_rate() -> u64 {
    12
}

fn default_flush_interval_secs() -> u64 {
    60
}

fn default_vacuum_interval_secs() -> u64 {
    24 * 60 * 60
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_journal_path(),
            flush_rate: default_flush_rate(),
            flush_interval_secs: default_flush_interval_secs(),
            vacuum_schedule: None,
            vacuum_interval_secs: default_vacuum_interval_secs(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        match &self.source {
            SourceConfig::Http { url, timeout_ms } => {
                anyhow::ensure!(
                    url.starts_with("http://") || url.starts_with("https://"),
                    "source.url must be an http(s) URL, got {:?}",
                    url
                );
                anyhow::ensure!(
                    *timeout_ms > 0,
                    "source.timeout_ms must be > 0, got {}",
                    timeout_ms
                );
            }
            SourceConfig::Process { pid, process_name } => {
                anyhow::ensure!(
                    pid.is_some() || process_name.as_deref().is_some_and(|n| !n.is_empty()),
                    "source.pid or source.process_name must be set for kind = \"process\""
                );
            }
        }
        anyhow::ensure!(
            self.sampling.interval_secs > 0,
            "sampling.interval_secs must be > 0, got {}",
            self.sampling.interval_secs
        );
        anyhow::ensure!(
            self.sampling.stats_log_interval_secs > 0,
            "sampling.stats_log_interval_secs must be > 0, got {}",
            self.sampling.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.sampling.broadcast_capacity > 0,
            "sampling.broadcast_capacity must be > 0, got {}",
            self.sampling.broadcast_capacity
        );
        anyhow::ensure!(
            self.store.capacity_bytes > 0,
            "store.capacity_bytes must be > 0, got {}",
            self.store.capacity_bytes
        );
        if self.journal.enabled {
            anyhow::ensure!(
                !self.journal.path.is_empty(),
                "journal.path must be non-empty"
            );
            anyhow::ensure!(
                self.journal.flush_rate > 0,
                "journal.flush_rate must be > 0, got {}",
                self.journal.flush_rate
            );
            anyhow::ensure!(
                self.journal.flush_interval_secs > 0,
                "journal.flush_interval_secs must be > 0, got {}",
                self.journal.flush_interval_secs
            );
            anyhow::ensure!(
                self.journal.vacuum_interval_secs > 0,
                "journal.vacuum_interval_secs must be > 0, got {}",
                self.journal.vacuum_interval_secs
            );
            if let Some(schedule) = &self.journal.vacuum_schedule {
                cron::Schedule::from_str(schedule).map_err(|e| {
                    anyhow::anyhow!("journal.vacuum_schedule {:?} is invalid: {}", schedule, e)
                })?;
            }
        }
        Ok(())
    }
}
