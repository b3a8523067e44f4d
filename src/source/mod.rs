// Snapshot sources: where status readings come from.

mod http;
mod json;
mod process;

pub use http::HttpSource;
pub use json::{snapshot_from_json, value_from_json};
pub use process::{ProcessSource, ProcessTarget};

use crate::config::SourceConfig;
use crate::error::CaptureError;
use crate::models::Snapshot;
use std::future::Future;
use std::time::Duration;

/// One status reading on demand. Failures are transient; the sampler skips that tick.
pub trait SnapshotSource: Send + Sync + 'static {
    fn capture(&self) -> impl Future<Output = Result<Snapshot, CaptureError>> + Send;

    /// Human-readable target (URL, pid, process name) for logs and the index page.
    fn describe(&self) -> String;
}

/// Source chosen by configuration.
pub enum Source {
    Http(HttpSource),
    Process(ProcessSource),
}

impl Source {
    pub fn from_config(config: &SourceConfig) -> anyhow::Result<Self> {
        match config {
            SourceConfig::Http { url, timeout_ms } => Ok(Source::Http(HttpSource::new(
                url,
                Duration::from_millis(*timeout_ms),
            )?)),
            SourceConfig::Process { pid, process_name } => {
                let target = match (pid, process_name) {
                    (Some(pid), _) => ProcessTarget::Pid(*pid),
                    (None, Some(name)) => ProcessTarget::Name(name.clone()),
                    (None, None) => anyhow::bail!("process source needs a pid or process_name"),
                };
                Ok(Source::Process(ProcessSource::new(target)))
            }
        }
    }
}

impl SnapshotSource for Source {
    async fn capture(&self) -> Result<Snapshot, CaptureError> {
        match self {
            Source::Http(s) => s.capture().await,
            Source::Process(s) => s.capture().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Source::Http(s) => s.describe(),
            Source::Process(s) => s.describe(),
        }
    }
}
