use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::database::models::{Incident, Monitor};
use crate::database::IncidentStore;
use crate::error::StoreResult;

/// What a down/up event did to a monitor's incidents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "transition", content = "incident", rename_all = "snake_case")]
pub enum IncidentTransition {
    /// A new OPEN incident was created
    Opened(Incident),
    /// The OPEN incident was closed
    Resolved(Incident),
    /// Already open on down, or nothing to close on up
    Unchanged,
}

/// Maintains the NONE -> OPEN -> RESOLVED lifecycle per monitor.
///
/// Each event is one lookup of the open incident followed by at most one
/// write. Callers must not run two events for the same monitor concurrently;
/// the scheduler guarantees this by never having one monitor in flight twice.
pub struct IncidentManager {
    store: Arc<dyn IncidentStore>,
    clock: Arc<dyn Clock>,
}

impl IncidentManager {
    pub fn new(store: Arc<dyn IncidentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The monitor failed a check
    pub async fn on_down(&self, monitor: &Monitor, reason: &str) -> StoreResult<IncidentTransition> {
        let monitor_id = monitor.persisted_id()?;

        if let Some(open) = self.store.find_open(monitor_id).await?.filter(Incident::is_open) {
            debug!(
                monitor_id,
                incident_id = open.id,
                "Monitor '{}' is still down, incident already open",
                monitor.name
            );
            return Ok(IncidentTransition::Unchanged);
        }

        let mut incident = Incident::open(monitor_id, &monitor.name, reason, self.clock.now());
        incident.id = Some(self.store.save(&incident).await?);
        warn!(
            monitor_id,
            incident_id = incident.id,
            reason,
            "New incident opened: '{}' is down",
            monitor.name
        );
        Ok(IncidentTransition::Opened(incident))
    }

    /// The monitor passed a check
    pub async fn on_up(&self, monitor: &Monitor) -> StoreResult<IncidentTransition> {
        let monitor_id = monitor.persisted_id()?;

        let Some(mut incident) = self.store.find_open(monitor_id).await?.filter(Incident::is_open)
        else {
            return Ok(IncidentTransition::Unchanged);
        };

        incident.resolve(self.clock.now());
        self.store.save(&incident).await?;
        info!(
            monitor_id,
            incident_id = incident.id,
            "Incident resolved: '{}' is back up",
            monitor.name
        );
        Ok(IncidentTransition::Resolved(incident))
    }

    /// Every incident of a monitor, newest first
    pub async fn incidents_for_monitor(&self, monitor_id: i64) -> StoreResult<Vec<Incident>> {
        self.store.find_by_monitor(monitor_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::database::models::{IncidentStatus, Severity};
    use crate::testing::{create_test_database, insert_monitor, t0};
    use chrono::Duration;

    #[tokio::test]
    async fn first_failure_opens_an_incident() -> anyhow::Result<()> {
        let db = create_test_database().await?;
        let manager = IncidentManager::new(db.store.clone(), Arc::new(ManualClock::new(t0())));
        let monitor = insert_monitor(&db, "checkout", "https://shop.example.com", 60).await?;

        let IncidentTransition::Opened(incident) =
            manager.on_down(&monitor, "HTTP error 500").await?
        else {
            panic!("expected an incident to be opened");
        };

        assert_eq!(incident.status, IncidentStatus::Open);
        assert_eq!(incident.severity, Severity::High);
        assert_eq!(incident.title, "Monitor Down: checkout");
        assert_eq!(incident.description, "HTTP error 500");
        assert_eq!(incident.opened_at, t0());
        assert_eq!(incident.resolved_at, None);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_down_keeps_a_single_open_incident() -> anyhow::Result<()> {
        let db = create_test_database().await?;
        let clock = Arc::new(ManualClock::new(t0()));
        let manager = IncidentManager::new(db.store.clone(), clock.clone());
        let monitor = insert_monitor(&db, "api", "https://api.example.com", 60).await?;

        assert!(matches!(
            manager.on_down(&monitor, "Timeout or DNS error").await?,
            IncidentTransition::Opened(_)
        ));
        clock.advance(Duration::seconds(60));
        assert_eq!(
            manager.on_down(&monitor, "HTTP error 502").await?,
            IncidentTransition::Unchanged
        );

        let incidents = manager.incidents_for_monitor(monitor.persisted_id()?).await?;
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].status, IncidentStatus::Open);
        assert_eq!(incidents[0].description, "Timeout or DNS error");
        assert_eq!(incidents[0].opened_at, t0());
        Ok(())
    }

    #[tokio::test]
    async fn repeated_up_resolves_once() -> anyhow::Result<()> {
        let db = create_test_database().await?;
        let clock = Arc::new(ManualClock::new(t0()));
        let manager = IncidentManager::new(db.store.clone(), clock.clone());
        let monitor = insert_monitor(&db, "api", "https://api.example.com", 60).await?;

        manager.on_down(&monitor, "HTTP error 503").await?;
        clock.advance(Duration::seconds(45));

        let IncidentTransition::Resolved(resolved) = manager.on_up(&monitor).await? else {
            panic!("expected the open incident to be resolved");
        };
        assert_eq!(resolved.resolved_at, Some(t0() + Duration::seconds(45)));

        clock.advance(Duration::seconds(45));
        assert_eq!(manager.on_up(&monitor).await?, IncidentTransition::Unchanged);

        let incidents = manager.incidents_for_monitor(monitor.persisted_id()?).await?;
        assert_eq!(incidents, vec![resolved]);
        Ok(())
    }

    #[tokio::test]
    async fn healthy_monitor_without_incident_is_a_no_op() -> anyhow::Result<()> {
        let db = create_test_database().await?;
        let manager = IncidentManager::new(db.store.clone(), Arc::new(ManualClock::new(t0())));
        let monitor = insert_monitor(&db, "api", "https://api.example.com", 60).await?;

        assert_eq!(manager.on_up(&monitor).await?, IncidentTransition::Unchanged);
        assert!(manager.incidents_for_monitor(monitor.persisted_id()?).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failure_after_resolution_opens_a_new_incident() -> anyhow::Result<()> {
        let db = create_test_database().await?;
        let clock = Arc::new(ManualClock::new(t0()));
        let manager = IncidentManager::new(db.store.clone(), clock.clone());
        let monitor = insert_monitor(&db, "api", "https://api.example.com", 60).await?;

        manager.on_down(&monitor, "HTTP error 500").await?;
        clock.advance(Duration::seconds(60));
        manager.on_up(&monitor).await?;
        clock.advance(Duration::seconds(60));
        manager.on_down(&monitor, "HTTP error 404").await?;

        let incidents = manager.incidents_for_monitor(monitor.persisted_id()?).await?;
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0].status, IncidentStatus::Open);
        assert_eq!(incidents[0].description, "HTTP error 404");
        assert_eq!(incidents[1].status, IncidentStatus::Resolved);
        assert_ne!(incidents[0].id, incidents[1].id);
        Ok(())
    }

    #[tokio::test]
    async fn incidents_are_scoped_to_their_monitor() -> anyhow::Result<()> {
        let db = create_test_database().await?;
        let manager = IncidentManager::new(db.store.clone(), Arc::new(ManualClock::new(t0())));
        let api = insert_monitor(&db, "api", "https://api.example.com", 60).await?;
        let web = insert_monitor(&db, "web", "https://www.example.com", 60).await?;

        manager.on_down(&api, "HTTP error 500").await?;
        assert!(matches!(
            manager.on_down(&web, "HTTP error 500").await?,
            IncidentTransition::Opened(_)
        ));
        assert!(matches!(manager.on_up(&web).await?, IncidentTransition::Resolved(_)));

        let api_incidents = manager.incidents_for_monitor(api.persisted_id()?).await?;
        assert_eq!(api_incidents.len(), 1);
        assert!(api_incidents[0].is_open());
        Ok(())
    }

    /// Store whose open-incident lookup hands back an already resolved row
    struct StaleLookupStore {
        resolved: Incident,
    }

    #[async_trait::async_trait]
    impl IncidentStore for StaleLookupStore {
        async fn find_open(&self, _monitor_id: i64) -> StoreResult<Option<Incident>> {
            Ok(Some(self.resolved.clone()))
        }

        async fn save(&self, _incident: &Incident) -> StoreResult<i64> {
            Ok(99)
        }

        async fn find_by_monitor(&self, _monitor_id: i64) -> StoreResult<Vec<Incident>> {
            Ok(vec![self.resolved.clone()])
        }
    }

    #[tokio::test]
    async fn resolved_incident_from_lookup_is_not_treated_as_open() -> anyhow::Result<()> {
        let mut monitor =
            Monitor::new(1, "api".into(), "https://api.example.com".into(), 60, t0());
        monitor.id = Some(7);
        let mut resolved = Incident::open(7, "api", "HTTP error 500", t0());
        resolved.id = Some(1);
        resolved.resolve(t0() + Duration::seconds(30));

        let clock = Arc::new(ManualClock::new(t0() + Duration::seconds(60)));
        let manager = IncidentManager::new(Arc::new(StaleLookupStore { resolved }), clock);

        assert_eq!(manager.on_up(&monitor).await?, IncidentTransition::Unchanged);
        assert!(matches!(
            manager.on_down(&monitor, "HTTP error 502").await?,
            IncidentTransition::Opened(_)
        ));
        Ok(())
    }
}
