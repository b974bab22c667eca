use async_trait::async_trait;
use serde_json::Value;
use soil_types::{paths, WriteSet};
use tracing::error;

use crate::error::StoreResult;
use crate::traits::{TransactionFn, TreeStore, WriteMode};

/// Default number of characters of a payload included in error logs.
pub const DEFAULT_VALUE_LIMIT: usize = 100;

/// [`TreeStore`] decorator that logs failed calls before returning the
/// error unchanged.
///
/// Failures on the admin-flag namespace are returned without logging:
/// permission-check reads there fail routinely for non-admins.
pub struct LoggedTreeStore<S> {
    inner: S,
    value_limit: usize,
}

impl<S: TreeStore> LoggedTreeStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            value_limit: DEFAULT_VALUE_LIMIT,
        }
    }

    pub fn with_value_limit(mut self, limit: usize) -> Self {
        self.value_limit = limit;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn report<T>(
        &self,
        result: StoreResult<T>,
        method: &'static str,
        path: &str,
        data: Option<&Value>,
    ) -> StoreResult<T> {
        if let Err(err) = &result {
            if !paths::is_admin_path(path) {
                let rendered = data.map(Value::to_string).unwrap_or_default();
                error!(
                    method,
                    path,
                    data_len = rendered.len(),
                    value = %truncate(&rendered, self.value_limit),
                    error = %err,
                    "tree store request failed"
                );
            }
        }
        result
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for LoggedTreeStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggedTreeStore")
            .field("inner", &self.inner)
            .field("value_limit", &self.value_limit)
            .finish()
    }
}

fn truncate(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

#[async_trait]
impl<S: TreeStore> TreeStore for LoggedTreeStore<S> {
    async fn read(&self, path: &str) -> StoreResult<Option<Value>> {
        let result = self.inner.read(path).await;
        self.report(result, "read", path, None)
    }

    async fn batch_apply(&self, writes: &WriteSet, mode: WriteMode) -> StoreResult<()> {
        let result = self.inner.batch_apply(writes, mode).await;
        if result.is_err() {
            // A batch is logged against its first path; admin-only batches
            // stay silent like single admin-flag requests.
            let path = writes.paths().next().map(String::as_str).unwrap_or("/");
            let data = serde_json::to_value(writes).ok();
            return self.report(result, "batch_apply", path, data.as_ref());
        }
        result
    }

    async fn generate_key(&self, path: &str) -> StoreResult<String> {
        let result = self.inner.generate_key(path).await;
        self.report(result, "generate_key", path, None)
    }

    async fn run_with_optimistic_retry(
        &self,
        path: &str,
        update: TransactionFn<'_>,
    ) -> StoreResult<Option<Value>> {
        let result = self.inner.run_with_optimistic_retry(path, update).await;
        self.report(result, "run_with_optimistic_retry", path, None)
    }
}
