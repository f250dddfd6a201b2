//! Shared fixtures for unit tests

use std::collections::{HashMap, VecDeque};
use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::database::models::Monitor;
use crate::database::{LibsqlStore, MonitorStore, Stores, open_store};
use crate::monitoring::prober::Prober;
use crate::monitoring::types::{Outcome, ProbeStatus};

/// A migrated database in a temporary directory, removed on drop
pub struct TestDatabase {
    pub store: Arc<LibsqlStore>,
    _dir: TempDir,
}

impl TestDatabase {
    pub fn stores(&self) -> Stores {
        Stores::from_libsql(self.store.clone())
    }
}

pub async fn create_test_database() -> anyhow::Result<TestDatabase> {
    let dir = tempfile::tempdir()?;
    let store = open_store(&dir.path().join("test.db"), 2).await?;
    Ok(TestDatabase { store: Arc::new(store), _dir: dir })
}

/// Insert an active, never checked monitor owned by user 1
pub async fn insert_monitor(
    db: &TestDatabase,
    name: &str,
    url: &str,
    interval_seconds: u32,
) -> anyhow::Result<Monitor> {
    let mut monitor = Monitor::new(1, name.to_string(), url.to_string(), interval_seconds, t0());
    monitor.id = Some(MonitorStore::save(db.store.as_ref(), &monitor).await?);
    Ok(monitor)
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

/// Prober answering from a per-URL script. An exhausted or missing script
/// answers with no response.
#[derive(Default)]
pub struct ScriptedProber {
    scripts: Mutex<HashMap<String, VecDeque<ProbeStatus>>>,
    calls: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, url: &str, statuses: impl IntoIterator<Item = ProbeStatus>) {
        self.scripts.lock().unwrap().entry(url.to_string()).or_default().extend(statuses);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, target: &str) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.scripts.lock().unwrap().get_mut(target).and_then(VecDeque::pop_front);
        match next {
            Some(ProbeStatus::Responded(code)) => Outcome::responded(code, 12),
            Some(ProbeStatus::NoResponse) | None => Outcome::no_response(3_000),
        }
    }
}

/// One event seen by [`CapturedLogs`], fields rendered as `name=value`
#[derive(Debug, Clone)]
pub struct LogLine {
    pub level: Level,
    pub fields: String,
}

impl LogLine {
    pub fn has(&self, field: &str) -> bool {
        self.fields.split(' ').any(|pair| pair == field)
    }
}

/// Layer keeping every event emitted while its guard is alive
#[derive(Clone, Default)]
pub struct CapturedLogs {
    lines: Arc<Mutex<Vec<LogLine>>>,
}

impl CapturedLogs {
    /// Capture on the current thread until the guard drops
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(logs.clone()));
        (logs, guard)
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().unwrap().clone()
    }
}

struct FieldWriter<'a>(&'a mut String);

impl Visit for FieldWriter<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let _ = write!(self.0, "{}={:?} ", field.name(), value);
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = String::new();
        event.record(&mut FieldWriter(&mut fields));
        self.lines.lock().unwrap().push(LogLine { level: *event.metadata().level(), fields });
    }
}
