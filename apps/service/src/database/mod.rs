/// Database layer
///
/// Store traits describe the persistence seam used by the monitoring core;
/// `LibsqlStore` implements all of them on a pooled libsql database.
pub mod migrations;
pub mod models;
pub mod repository;

use std::sync::Arc;

use anyhow::Result;

pub use repository::{HistoryStore, IncidentStore, LibsqlStore, MonitorStore};

use crate::pool::LibsqlPool;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}

/// Open the pool and bring the schema up to date
pub async fn open_store(path: &std::path::Path, pool_size: usize) -> Result<LibsqlStore> {
    let pool: LibsqlPool = crate::pool::open_pool(path, pool_size).await?;
    {
        let conn = pool.get().await?;
        initialize_database(&conn).await?;
    }
    Ok(LibsqlStore::new_from_pool(pool))
}

/// The three stores the monitoring core works against
#[derive(Clone)]
pub struct Stores {
    pub monitors: Arc<dyn MonitorStore>,
    pub history: Arc<dyn HistoryStore>,
    pub incidents: Arc<dyn IncidentStore>,
}

impl Stores {
    /// Serve every store from one libsql database
    pub fn from_libsql(store: Arc<LibsqlStore>) -> Self {
        Self { monitors: store.clone(), history: store.clone(), incidents: store }
    }
}
