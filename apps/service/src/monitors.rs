//! Monitor management: creation, partial updates and removal.
//!
//! Names and URLs are unique per owner, and the check interval may not go
//! below the configured floor. Owners are plain ids handed in by the caller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::Clock;
use crate::config::MonitorPolicy;
use crate::database::models::Monitor;
use crate::database::MonitorStore;
use crate::error::{MonitorError, StoreError};
use crate::validation::{validate_http_endpoint, validate_monitor_name};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMonitor {
    pub name: String,
    pub url: String,
    /// Falls back to the policy default when absent
    pub interval_seconds: Option<u32>,
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub interval_seconds: Option<u32>,
    pub active: Option<bool>,
}

pub struct MonitorService {
    store: Arc<dyn MonitorStore>,
    policy: MonitorPolicy,
    clock: Arc<dyn Clock>,
}

impl MonitorService {
    pub fn new(store: Arc<dyn MonitorStore>, policy: MonitorPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { store, policy, clock }
    }

    pub async fn create(&self, owner_id: i64, new: NewMonitor) -> Result<Monitor, MonitorError> {
        let name = new.name.trim().to_string();
        let url = new.url.trim().to_string();
        let interval = new.interval_seconds.unwrap_or(self.policy.default_interval_seconds);

        self.check_interval(interval)?;
        check_name(&name)?;
        check_url(&url)?;

        if self.store.name_taken(owner_id, &name).await? {
            return Err(MonitorError::DuplicateName(name));
        }
        if self.store.url_taken(owner_id, &url).await? {
            return Err(MonitorError::DuplicateUrl(url));
        }

        let mut monitor = Monitor::new(owner_id, name, url, interval, self.clock.now());
        monitor.id = Some(self.store.save(&monitor).await.map_err(|e| conflict(e, &monitor))?);

        info!(
            monitor_id = monitor.id,
            owner_id,
            "Created monitor '{}' for {}",
            monitor.name,
            monitor.url
        );
        Ok(monitor)
    }

    pub async fn update(&self, id: i64, changes: MonitorUpdate) -> Result<Monitor, MonitorError> {
        let mut monitor = self.get(id).await?;

        if let Some(name) = changes.name.map(|n| n.trim().to_string()) {
            if name != monitor.name {
                check_name(&name)?;
                if self.store.name_taken(monitor.owner_id, &name).await? {
                    return Err(MonitorError::DuplicateName(name));
                }
                monitor.name = name;
            }
        }

        if let Some(url) = changes.url.map(|u| u.trim().to_string()) {
            if url != monitor.url {
                check_url(&url)?;
                if self.store.url_taken(monitor.owner_id, &url).await? {
                    return Err(MonitorError::DuplicateUrl(url));
                }
                monitor.url = url;
            }
        }

        if let Some(interval) = changes.interval_seconds {
            self.check_interval(interval)?;
            monitor.interval_seconds = interval;
        }

        if let Some(active) = changes.active {
            monitor.active = active;
        }

        self.store.save(&monitor).await.map_err(|e| conflict(e, &monitor))?;
        info!(monitor_id = id, "Updated monitor '{}'", monitor.name);

        // last_checked_at may have moved since the read above
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), MonitorError> {
        if self.store.delete(id).await? {
            info!(monitor_id = id, "Deleted monitor");
            Ok(())
        } else {
            Err(MonitorError::NotFound(id))
        }
    }

    pub async fn get(&self, id: i64) -> Result<Monitor, MonitorError> {
        self.store.find(id).await?.ok_or(MonitorError::NotFound(id))
    }

    pub async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Monitor>, MonitorError> {
        Ok(self.store.list_by_owner(owner_id).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<Monitor>, MonitorError> {
        Ok(self.store.list_all().await?)
    }

    fn check_interval(&self, interval: u32) -> Result<(), MonitorError> {
        if interval < self.policy.min_interval_seconds {
            return Err(MonitorError::IntervalTooShort {
                given: interval,
                minimum: self.policy.min_interval_seconds,
            });
        }
        Ok(())
    }
}

fn check_name(name: &str) -> Result<(), MonitorError> {
    validate_monitor_name(name).or_else(MonitorError::InvalidName)
}

fn check_url(url: &str) -> Result<(), MonitorError> {
    validate_http_endpoint(url)
        .or_else(|reason| MonitorError::InvalidUrl { url: url.to_string(), reason })
}

/// A uniqueness race lost against a concurrent writer still reads as a duplicate
fn conflict(error: StoreError, monitor: &Monitor) -> MonitorError {
    match error {
        StoreError::Conflict { constraint } if constraint.ends_with(".url") => {
            MonitorError::DuplicateUrl(monitor.url.clone())
        }
        StoreError::Conflict { .. } => MonitorError::DuplicateName(monitor.name.clone()),
        StoreError::NotFound => match monitor.id {
            Some(id) => MonitorError::NotFound(id),
            None => MonitorError::Store(StoreError::NotFound),
        },
        other => MonitorError::Store(other),
    }
}
