use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Operation cap per store batch.
pub const DEFAULT_MAX_OPS_PER_BATCH: usize = 999;

/// Pause between bulk batches, in milliseconds.
pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 1100;

/// Configuration for the batched writer and its bulk queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Maximum entries per `batch_apply` call in bulk mode.
    pub max_ops_per_batch: usize,
    /// Token refill period for bulk batches. `0` disables rate limiting.
    pub batch_interval_ms: u64,
    /// How many bulk batches may be sent back-to-back before waiting.
    pub burst: u32,
    /// Attempts per bulk batch beyond the first.
    pub max_retries: u32,
    /// Base delay of the exponential retry backoff.
    pub retry_base_delay_ms: u64,
    /// Accept root-level entries (expanded into top-level writes).
    pub allow_root: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_ops_per_batch: DEFAULT_MAX_OPS_PER_BATCH,
            batch_interval_ms: DEFAULT_BATCH_INTERVAL_MS,
            burst: 1,
            max_retries: 3,
            retry_base_delay_ms: 250,
            allow_root: false,
        }
    }
}

impl WriterConfig {
    /// No pacing and no retry delay. Suitable for in-memory stores.
    pub fn permissive() -> Self {
        Self {
            batch_interval_ms: 0,
            retry_base_delay_ms: 0,
            ..Default::default()
        }
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}
