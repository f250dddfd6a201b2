use std::sync::Arc;

use crate::clock::Clock;
use crate::database::models::{CheckRecord, Monitor};
use crate::database::HistoryStore;
use crate::error::StoreResult;

/// Page size of [`HistoryRecorder::recent`] when the caller has no preference
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Appends one record per executed check and serves history queries
pub struct HistoryRecorder {
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn HistoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record a check outcome stamped with the current time.
    ///
    /// `success` is taken as given and never re-derived from `status_code`.
    pub async fn record(
        &self,
        monitor: &Monitor,
        status_code: Option<u16>,
        elapsed_ms: u64,
        success: bool,
    ) -> StoreResult<CheckRecord> {
        let mut record = CheckRecord {
            id: None,
            monitor_id: monitor.persisted_id()?,
            status_code,
            latency_ms: elapsed_ms,
            success,
            checked_at: self.clock.now(),
        };
        record.id = Some(self.store.append(&record).await?);
        Ok(record)
    }

    /// Most recent `limit` records, newest first
    pub async fn recent(&self, monitor_id: i64, limit: usize) -> StoreResult<Vec<CheckRecord>> {
        self.store.find_recent(monitor_id, limit).await
    }

    /// Full history, newest first
    pub async fn all(&self, monitor_id: i64) -> StoreResult<Vec<CheckRecord>> {
        self.store.find_all(monitor_id).await
    }
}
