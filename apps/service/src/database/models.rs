use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{StoreError, StoreResult};

/// Monitor model - an endpoint that is health-checked on an interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: Option<i64>,
    pub owner_id: i64,
    pub name: String,
    pub url: String,
    pub interval_seconds: u32,
    pub active: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Monitor {
    /// Create a new, not yet persisted monitor
    pub fn new(
        owner_id: i64,
        name: String,
        url: String,
        interval_seconds: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            owner_id,
            name,
            url,
            interval_seconds,
            active: true,
            last_checked_at: None,
            created_at,
        }
    }

    /// Database id, or `NotPersistent` for monitors that were never saved
    pub fn persisted_id(&self) -> StoreResult<i64> {
        self.id.ok_or(StoreError::NotPersistent)
    }

    pub fn interval(&self) -> Duration {
        Duration::seconds(i64::from(self.interval_seconds))
    }

    /// Earliest instant at which the next check may run; `None` means never checked.
    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        self.last_checked_at.map(|last| last + self.interval())
    }

    /// A monitor is due when it was never checked or its interval has fully elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_due_at() {
            None => true,
            Some(due_at) => due_at <= now,
        }
    }
}

/// One executed check. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub id: Option<i64>,
    pub monitor_id: i64,
    /// `None` when the endpoint never answered
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    pub success: bool,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IncidentStatus {
    Open,
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "OPEN",
            IncidentStatus::Resolved => "RESOLVED",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(IncidentStatus::Open),
            "RESOLVED" => Ok(IncidentStatus::Resolved),
            other => Err(StoreError::Decode {
                table: "incidents",
                reason: format!("unknown status '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(StoreError::Decode {
                table: "incidents",
                reason: format!("unknown severity '{other}'"),
            }),
        }
    }
}

/// An outage window for a monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: Option<i64>,
    pub monitor_id: i64,
    pub status: IncidentStatus,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub opened_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Incident {
    /// New OPEN incident for a monitor that just went down
    pub fn open(monitor_id: i64, monitor_name: &str, reason: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            monitor_id,
            status: IncidentStatus::Open,
            severity: Severity::High,
            title: format!("Monitor Down: {monitor_name}"),
            description: reason.to_string(),
            opened_at: now,
            resolved_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == IncidentStatus::Open
    }

    pub fn resolve(&mut self, now: DateTime<Utc>) {
        self.status = IncidentStatus::Resolved;
        self.resolved_at = Some(now);
    }
}

/// Convert a timestamp to the stored representation (UTC milliseconds)
pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert stored UTC milliseconds back into a timestamp
pub fn i64_to_timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn monitor_at(last_checked: Option<DateTime<Utc>>, interval_seconds: u32) -> Monitor {
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut monitor =
            Monitor::new(1, "api".into(), "https://example.com".into(), interval_seconds, created);
        monitor.last_checked_at = last_checked;
        monitor
    }

    #[test]
    fn never_checked_monitor_is_always_due() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(monitor_at(None, 30).is_due(now));
        assert!(monitor_at(None, 86_400).is_due(now));
    }

    #[test]
    fn due_boundary_is_inclusive() {
        let last = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let monitor = monitor_at(Some(last), 60);

        assert!(!monitor.is_due(last + Duration::seconds(59)));
        assert!(!monitor.is_due(last + Duration::milliseconds(59_999)));
        assert!(monitor.is_due(last + Duration::seconds(60)));
        assert!(monitor.is_due(last + Duration::seconds(61)));
    }

    #[test]
    fn incident_lifecycle_fields() {
        let opened = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut incident = Incident::open(7, "checkout", "HTTP error 502", opened);
        assert!(incident.is_open());
        assert_eq!(incident.title, "Monitor Down: checkout");
        assert_eq!(incident.severity, Severity::High);
        assert!(incident.resolved_at.is_none());

        let resolved = opened + Duration::seconds(90);
        incident.resolve(resolved);
        assert_eq!(incident.status, IncidentStatus::Resolved);
        assert_eq!(incident.resolved_at, Some(resolved));
    }

    #[test]
    fn stored_labels_parse_back() {
        assert_eq!("OPEN".parse::<IncidentStatus>().unwrap(), IncidentStatus::Open);
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
        assert!("open".parse::<IncidentStatus>().is_err());
    }

    #[test]
    fn timestamps_keep_millisecond_precision() {
        let time = Utc.timestamp_millis_opt(1_767_225_600_123).unwrap();
        assert_eq!(i64_to_timestamp(timestamp_to_i64(time)), time);
    }
}
