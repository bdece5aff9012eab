use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::crypto::KdfParams;

pub const SECOND_MS: i64 = 1_000;
pub const MINUTE_MS: i64 = 60 * SECOND_MS;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Width of the parallel lane.
    pub parallel_concurrency: usize,
    pub busy_timeout_ms: u64,
    pub journal_mode: String,

    pub max_sync_task_attempts: i64,
    pub sync_task_retention_ms: i64,

    /// Prioritized (on-screen) download jobs are retried once their last
    /// attempt is older than this, ignoring `retryAfter`.
    pub priority_retry_window_ms: i64,
    /// Delay before retry N is `download_backoff_ms[N - 1]`, clamped to the
    /// last entry.
    pub download_backoff_ms: Vec<i64>,
    pub max_download_attempts: i64,

    pub kdf: KdfParams,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            parallel_concurrency: 10,
            busy_timeout_ms: 5_000,
            journal_mode: "WAL".to_string(),
            max_sync_task_attempts: 5,
            sync_task_retention_ms: 2 * DAY_MS,
            priority_retry_window_ms: HOUR_MS,
            download_backoff_ms: vec![30 * SECOND_MS, 5 * MINUTE_MS, HOUR_MS, 6 * HOUR_MS, DAY_MS],
            max_download_attempts: 5,
            kdf: KdfParams::default(),
        }
    }
}

impl StoreConfig {
    pub fn for_test() -> Self {
        Self {
            kdf: KdfParams::for_test(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read store config {}", path.display()))?;
        let config: StoreConfig = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse store config {}", path.display()))?;
        config.validated()
    }

    fn validated(mut self) -> Result<Self> {
        if self.parallel_concurrency == 0 {
            anyhow::bail!("parallel_concurrency must be at least 1");
        }
        if self.download_backoff_ms.is_empty() {
            self.download_backoff_ms = StoreConfig::default().download_backoff_ms;
        }
        Ok(self)
    }

    pub fn download_backoff_for(&self, attempts: i64) -> i64 {
        let idx = usize::try_from(attempts.saturating_sub(1)).unwrap_or(0);
        self.download_backoff_ms
            .get(idx)
            .or_else(|| self.download_backoff_ms.last())
            .copied()
            .unwrap_or(HOUR_MS)
    }
}
