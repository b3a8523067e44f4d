// Status document over HTTP (e.g. a database's node-stats endpoint).

use std::time::Duration;

use reqwest::Client;
use tracing::instrument;

use super::SnapshotSource;
use super::json::snapshot_from_json;
use crate::error::CaptureError;
use crate::models::Snapshot;
use crate::version::user_agent;

pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl SnapshotSource for HttpSource {
    #[instrument(skip(self), fields(source = "http", operation = "capture", url = %self.url))]
    async fn capture(&self) -> Result<Snapshot, CaptureError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CaptureError::Status(status));
        }
        let body: serde_json::Value = response.json().await?;
        snapshot_from_json(body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
