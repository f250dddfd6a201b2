use deadpool::managed::PoolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    QueryFailure(#[from] libsql::Error),

    #[error("Could not acquire a database connection: {0}")]
    Pool(#[from] PoolError<libsql::Error>),

    #[error("Record not found")]
    NotFound,

    #[error("The record has not been persisted yet")]
    NotPersistent,

    #[error("Unique constraint violation on {constraint}")]
    Conflict { constraint: String },

    #[error("Malformed {table} row: {reason}")]
    Decode { table: &'static str, reason: String },

}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced to callers that create or edit monitors
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid monitor URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid monitor name: {0}")]
    InvalidName(String),

    #[error("The minimum allowed interval is {minimum} seconds (got {given})")]
    IntervalTooShort { given: u32, minimum: u32 },

    #[error("You already have a monitor named '{0}'")]
    DuplicateName(String),

    #[error("The URL '{0}' is already monitored by you")]
    DuplicateUrl(String),

    #[error("Monitor {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}
