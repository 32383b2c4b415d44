//! Out-of-band sync notifications
//!
//! After a successful answer the terminal tells an external endpoint what
//! was said. Delivery is best effort: failures are logged and dropped.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{HudError, Result};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    pub terminal_log: String,
    pub provider: String,
}

#[async_trait]
pub trait SyncNotifier: Send + Sync {
    async fn notify(&self, payload: &SyncPayload) -> Result<()>;
}

/// Posts the payload as JSON to a fixed URL
pub struct HttpSyncNotifier {
    url: String,
    client: reqwest::Client,
}

impl HttpSyncNotifier {
    pub fn new(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl SyncNotifier for HttpSyncNotifier {
    async fn notify(&self, payload: &SyncPayload) -> Result<()> {
        let response = self.client.post(&self.url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(HudError::Http(format!(
                "sync endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Used when no sync endpoint is configured
pub struct NoopSync;

#[async_trait]
impl SyncNotifier for NoopSync {
    async fn notify(&self, _payload: &SyncPayload) -> Result<()> {
        Ok(())
    }
}
