use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool::managed::Object;
use libsql::{Row, params};

use super::models::{
    CheckRecord, Incident, IncidentStatus, Monitor, i64_to_timestamp, timestamp_to_i64,
};
use crate::error::{StoreError, StoreResult};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Monitor persistence
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Every monitor, active or not
    async fn list_all(&self) -> StoreResult<Vec<Monitor>>;

    /// Active monitors whose interval has elapsed at `now` (or that were never checked)
    async fn find_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Monitor>>;

    async fn find(&self, id: i64) -> StoreResult<Option<Monitor>>;

    async fn list_by_owner(&self, owner_id: i64) -> StoreResult<Vec<Monitor>>;

    async fn name_taken(&self, owner_id: i64, name: &str) -> StoreResult<bool>;

    async fn url_taken(&self, owner_id: i64, url: &str) -> StoreResult<bool>;

    /// Insert when `monitor.id` is `None`, update otherwise. Returns the id.
    ///
    /// Updates leave `last_checked_at` alone; only [`Self::touch_last_checked`]
    /// moves it once a monitor exists.
    async fn save(&self, monitor: &Monitor) -> StoreResult<i64>;

    /// Partial update of the last-checked timestamp only
    async fn touch_last_checked(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()>;

    /// Returns `false` when no monitor had this id
    async fn delete(&self, id: i64) -> StoreResult<bool>;
}

/// Append-only check history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: &CheckRecord) -> StoreResult<i64>;

    /// Newest first
    async fn find_recent(&self, monitor_id: i64, limit: usize) -> StoreResult<Vec<CheckRecord>>;

    /// Newest first
    async fn find_all(&self, monitor_id: i64) -> StoreResult<Vec<CheckRecord>>;
}

#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// The most recent OPEN incident of a monitor, if any
    async fn find_open(&self, monitor_id: i64) -> StoreResult<Option<Incident>>;

    /// Insert when `incident.id` is `None`, update otherwise. Returns the id.
    async fn save(&self, incident: &Incident) -> StoreResult<i64>;

    /// Newest first
    async fn find_by_monitor(&self, monitor_id: i64) -> StoreResult<Vec<Incident>>;
}

const MONITOR_COLUMNS: &str =
    "id, owner_id, name, url, interval_seconds, is_active, last_checked_at, created_at";
const RECORD_COLUMNS: &str = "id, monitor_id, status_code, latency_ms, is_successful, checked_at";
const INCIDENT_COLUMNS: &str =
    "id, monitor_id, title, severity, description, status, opened_at, resolved_at";

/// LibSQL implementation of every store
pub struct LibsqlStore {
    pool: LibsqlPool,
}

impl LibsqlStore {
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> StoreResult<Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }

    async fn query_monitors(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> StoreResult<Vec<Monitor>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(sql, params).await?;
        let mut monitors = Vec::new();
        while let Some(row) = rows.next().await? {
            monitors.push(monitor_from_row(&row)?);
        }
        Ok(monitors)
    }

    async fn query_records(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> StoreResult<Vec<CheckRecord>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(sql, params).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(record_from_row(&row)?);
        }
        Ok(records)
    }

    async fn query_incidents(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> StoreResult<Vec<Incident>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(sql, params).await?;
        let mut incidents = Vec::new();
        while let Some(row) = rows.next().await? {
            incidents.push(incident_from_row(&row)?);
        }
        Ok(incidents)
    }

    async fn exists(&self, sql: &str, params: impl libsql::params::IntoParams) -> StoreResult<bool> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(sql, params).await?;
        Ok(rows.next().await?.is_some())
    }
}

#[async_trait]
impl MonitorStore for LibsqlStore {
    async fn list_all(&self) -> StoreResult<Vec<Monitor>> {
        self.query_monitors(&format!("SELECT {MONITOR_COLUMNS} FROM monitors ORDER BY id"), ())
            .await
    }

    async fn find_due(&self, now: DateTime<Utc>) -> StoreResult<Vec<Monitor>> {
        self.query_monitors(
            &format!(
                "SELECT {MONITOR_COLUMNS} FROM monitors
                 WHERE is_active = 1
                   AND (last_checked_at IS NULL OR last_checked_at + interval_seconds * 1000 <= ?)
                 ORDER BY id"
            ),
            params![timestamp_to_i64(now)],
        )
        .await
    }

    async fn find(&self, id: i64) -> StoreResult<Option<Monitor>> {
        let mut monitors = self
            .query_monitors(&format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE id = ?"), params![id])
            .await?;
        Ok(monitors.pop())
    }

    async fn list_by_owner(&self, owner_id: i64) -> StoreResult<Vec<Monitor>> {
        self.query_monitors(
            &format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE owner_id = ? ORDER BY id"),
            params![owner_id],
        )
        .await
    }

    async fn name_taken(&self, owner_id: i64, name: &str) -> StoreResult<bool> {
        self.exists(
            "SELECT 1 FROM monitors WHERE owner_id = ? AND name = ? LIMIT 1",
            params![owner_id, name.to_string()],
        )
        .await
    }

    async fn url_taken(&self, owner_id: i64, url: &str) -> StoreResult<bool> {
        self.exists(
            "SELECT 1 FROM monitors WHERE owner_id = ? AND url = ? LIMIT 1",
            params![owner_id, url.to_string()],
        )
        .await
    }

    async fn save(&self, monitor: &Monitor) -> StoreResult<i64> {
        let conn = self.get_conn().await?;

        let result = if let Some(id) = monitor.id {
            conn.execute(
                "UPDATE monitors SET owner_id = ?, name = ?, url = ?, interval_seconds = ?, is_active = ? WHERE id = ?",
                params![
                    monitor.owner_id,
                    monitor.name.clone(),
                    monitor.url.clone(),
                    i64::from(monitor.interval_seconds),
                    if monitor.active { 1 } else { 0 },
                    id
                ],
            )
            .await
            .map(|changed| (changed, id))
        } else {
            conn.execute(
                "INSERT INTO monitors (owner_id, name, url, interval_seconds, is_active, last_checked_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    monitor.owner_id,
                    monitor.name.clone(),
                    monitor.url.clone(),
                    i64::from(monitor.interval_seconds),
                    if monitor.active { 1 } else { 0 },
                    monitor.last_checked_at.map(timestamp_to_i64),
                    timestamp_to_i64(monitor.created_at)
                ],
            )
            .await
            .map(|changed| (changed, conn.last_insert_rowid()))
        };

        match result {
            Ok((0, _)) => Err(StoreError::NotFound),
            Ok((_, id)) => Ok(id),
            Err(error) => Err(map_constraint_error(error)),
        }
    }

    async fn touch_last_checked(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        let changed = conn
            .execute(
                "UPDATE monitors SET last_checked_at = ? WHERE id = ?",
                params![timestamp_to_i64(at), id],
            )
            .await?;

        if changed == 0 { Err(StoreError::NotFound) } else { Ok(()) }
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let conn = self.get_conn().await?;

        // History and incidents go with it via ON DELETE CASCADE
        let changed = conn.execute("DELETE FROM monitors WHERE id = ?", params![id]).await?;
        Ok(changed > 0)
    }
}

#[async_trait]
impl HistoryStore for LibsqlStore {
    async fn append(&self, record: &CheckRecord) -> StoreResult<i64> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO check_records (monitor_id, status_code, latency_ms, is_successful, checked_at) VALUES (?, ?, ?, ?, ?)",
            params![
                record.monitor_id,
                record.status_code.map(i64::from),
                i64::try_from(record.latency_ms).unwrap_or(i64::MAX),
                if record.success { 1 } else { 0 },
                timestamp_to_i64(record.checked_at)
            ],
        )
        .await
        .map_err(map_constraint_error)?;

        Ok(conn.last_insert_rowid())
    }

    async fn find_recent(&self, monitor_id: i64, limit: usize) -> StoreResult<Vec<CheckRecord>> {
        self.query_records(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM check_records WHERE monitor_id = ? ORDER BY checked_at DESC, id DESC LIMIT ?"
            ),
            params![monitor_id, i64::try_from(limit).unwrap_or(i64::MAX)],
        )
        .await
    }

    async fn find_all(&self, monitor_id: i64) -> StoreResult<Vec<CheckRecord>> {
        self.query_records(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM check_records WHERE monitor_id = ? ORDER BY checked_at DESC, id DESC"
            ),
            params![monitor_id],
        )
        .await
    }
}

#[async_trait]
impl IncidentStore for LibsqlStore {
    async fn find_open(&self, monitor_id: i64) -> StoreResult<Option<Incident>> {
        let mut incidents = self
            .query_incidents(
                &format!(
                    "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE monitor_id = ? AND status = ? ORDER BY opened_at DESC, id DESC LIMIT 1"
                ),
                params![monitor_id, IncidentStatus::Open.as_str()],
            )
            .await?;
        Ok(incidents.pop())
    }

    async fn save(&self, incident: &Incident) -> StoreResult<i64> {
        let conn = self.get_conn().await?;
        let resolved_at = incident.resolved_at.map(timestamp_to_i64);

        if let Some(id) = incident.id {
            let changed = conn
                .execute(
                    "UPDATE incidents SET title = ?, severity = ?, description = ?, status = ?, resolved_at = ? WHERE id = ?",
                    params![
                        incident.title.clone(),
                        incident.severity.as_str(),
                        incident.description.clone(),
                        incident.status.as_str(),
                        resolved_at,
                        id
                    ],
                )
                .await?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(id)
        } else {
            conn.execute(
                "INSERT INTO incidents (monitor_id, title, severity, description, status, opened_at, resolved_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    incident.monitor_id,
                    incident.title.clone(),
                    incident.severity.as_str(),
                    incident.description.clone(),
                    incident.status.as_str(),
                    timestamp_to_i64(incident.opened_at),
                    resolved_at
                ],
            )
            .await
            .map_err(map_constraint_error)?;
            Ok(conn.last_insert_rowid())
        }
    }

    async fn find_by_monitor(&self, monitor_id: i64) -> StoreResult<Vec<Incident>> {
        self.query_incidents(
            &format!(
                "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE monitor_id = ? ORDER BY opened_at DESC, id DESC"
            ),
            params![monitor_id],
        )
        .await
    }
}

fn map_constraint_error(error: libsql::Error) -> StoreError {
    const UNIQUE_FAILED: &str = "UNIQUE constraint failed: ";

    let message = error.to_string();
    match message.find(UNIQUE_FAILED) {
        Some(start) => StoreError::Conflict {
            constraint: message[start + UNIQUE_FAILED.len()..]
                .trim_end_matches(['`', ' '])
                .to_string(),
        },
        None => StoreError::QueryFailure(error),
    }
}

fn decode_error(table: &'static str, reason: impl Into<String>) -> StoreError {
    StoreError::Decode { table, reason: reason.into() }
}

fn monitor_from_row(row: &Row) -> StoreResult<Monitor> {
    let interval: i64 = row.get(4)?;

    Ok(Monitor {
        id: Some(row.get(0)?),
        owner_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        interval_seconds: u32::try_from(interval)
            .map_err(|_| decode_error("monitors", format!("interval {interval} out of range")))?,
        active: row.get::<i64>(5)? != 0,
        last_checked_at: row.get::<Option<i64>>(6)?.map(i64_to_timestamp),
        created_at: i64_to_timestamp(row.get(7)?),
    })
}

fn record_from_row(row: &Row) -> StoreResult<CheckRecord> {
    let status_code = match row.get::<Option<i64>>(2)? {
        Some(code) => Some(
            u16::try_from(code)
                .map_err(|_| decode_error("check_records", format!("status code {code}")))?,
        ),
        None => None,
    };

    Ok(CheckRecord {
        id: Some(row.get(0)?),
        monitor_id: row.get(1)?,
        status_code,
        latency_ms: u64::try_from(row.get::<i64>(3)?).unwrap_or_default(),
        success: row.get::<i64>(4)? != 0,
        checked_at: i64_to_timestamp(row.get(5)?),
    })
}

fn incident_from_row(row: &Row) -> StoreResult<Incident> {
    let severity: String = row.get(3)?;
    let status: String = row.get(5)?;

    Ok(Incident {
        id: Some(row.get(0)?),
        monitor_id: row.get(1)?,
        title: row.get(2)?,
        severity: severity.parse()?,
        description: row.get(4)?,
        status: status.parse()?,
        opened_at: i64_to_timestamp(row.get(6)?),
        resolved_at: row.get::<Option<i64>>(7)?.map(i64_to_timestamp),
    })
}
