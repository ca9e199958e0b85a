use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sf_core::AttemptId;
use sf_driver::LogSink;
use sf_store::Store;

/// Persists each driver log entry as a LOG artifact via the store.
pub struct StoreLogSink {
    store: Arc<dyn Store>,
    attempt_id: AttemptId,
}

impl StoreLogSink {
    pub fn new(store: Arc<dyn Store>, attempt_id: AttemptId) -> Self {
        Self { store, attempt_id }
    }
}

#[async_trait]
impl LogSink for StoreLogSink {
    async fn log(&self, sequence_num: i64, entry: Value, is_final: bool) {
        if let Err(err) = self
            .store
            .append_log(self.attempt_id, entry.to_string(), is_final)
            .await
        {
            tracing::error!(attempt_id = %self.attempt_id, sequence_num, %err, "failed to persist log artifact");
        }
    }
}
