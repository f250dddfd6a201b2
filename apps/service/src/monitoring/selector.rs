use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::database::models::Monitor;
use crate::database::MonitorStore;
use crate::error::StoreResult;

/// Decides which monitors need a check right now.
///
/// There is no queue or per-monitor timer: the due predicate is re-evaluated
/// from scratch against the store on every cycle.
pub struct DueSelector {
    monitors: Arc<dyn MonitorStore>,
}

impl DueSelector {
    pub fn new(monitors: Arc<dyn MonitorStore>) -> Self {
        Self { monitors }
    }

    /// Active monitors due at `now`, in no particular order.
    ///
    /// The store pre-filters; the predicate is applied again here with the
    /// same `now` so the batch is consistent whatever the store does.
    pub async fn select_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Monitor>> {
        let candidates = self.monitors.find_due(now).await?;
        Ok(candidates.into_iter().filter(|monitor| monitor.active && monitor.is_due(now)).collect())
    }
}
