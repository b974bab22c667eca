use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::Rng;
use serde::{Deserialize, Serialize};
use soil_store::{TreeStore, WriteMode};
use soil_types::WriteSet;
use tracing::{debug, warn};

use crate::config::WriterConfig;
use crate::error::{WriterError, WriterResult};

/// Outcome of a bulk run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    /// Batches applied.
    pub batches: usize,
    /// Entries applied across all batches.
    pub operations: usize,
    /// Failed attempts that were retried.
    pub retries: u32,
}

/// Sequential batch queue paced by a token bucket, with per-batch retry.
///
/// Each batch takes one token before it is sent. A failed batch is retried
/// with exponential backoff plus jitter; once retries run out the run stops
/// and later batches are never sent.
pub struct RateLimitedQueue {
    limiter: Option<DefaultDirectRateLimiter>,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl RateLimitedQueue {
    pub fn new(config: &WriterConfig) -> WriterResult<Self> {
        let limiter = if config.batch_interval_ms == 0 {
            None
        } else {
            let burst = NonZeroU32::new(config.burst)
                .ok_or_else(|| WriterError::InvalidConfig("burst must be at least 1".into()))?;
            let quota = Quota::with_period(config.batch_interval())
                .ok_or_else(|| WriterError::InvalidConfig("batch interval must be positive".into()))?
                .allow_burst(burst);
            Some(RateLimiter::direct(quota))
        };
        Ok(Self {
            limiter,
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
        })
    }

    /// Apply `batches` one after another in `mode`.
    pub async fn run<S>(&self, store: &S, batches: &[WriteSet], mode: WriteMode) -> WriterResult<BulkReport>
    where
        S: TreeStore + ?Sized,
    {
        let mut report = BulkReport::default();
        let total = batches.len();

        for (index, batch) in batches.iter().enumerate() {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            let mut attempt = 0u32;
            loop {
                match store.batch_apply(batch, mode).await {
                    Ok(()) => break,
                    Err(err) if attempt < self.max_retries => {
                        attempt += 1;
                        report.retries += 1;
                        let delay = self.backoff(attempt);
                        warn!(
                            batch = index,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "bulk batch failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(err) => {
                        return Err(WriterError::BulkAborted {
                            completed_batches: report.batches,
                            total_batches: total,
                            source: err,
                        });
                    }
                }
            }

            report.batches += 1;
            report.operations += batch.len();
            debug!(batch = index, total, entries = batch.len(), "bulk batch applied");
        }

        Ok(report)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.retry_base_delay.as_millis() as u64;
        if base == 0 {
            return Duration::ZERO;
        }
        let exp = base.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        Duration::from_millis(exp.saturating_add(jitter))
    }
}

impl std::fmt::Debug for RateLimitedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedQueue")
            .field("rate_limited", &self.limiter.is_some())
            .field("max_retries", &self.max_retries)
            .field("retry_base_delay", &self.retry_base_delay)
            .finish()
    }
}
