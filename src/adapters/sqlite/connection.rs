//! SQLite connection management.
//!
//! Every pool runs WAL with foreign keys enforced; file-backed databases get
//! their parent directory created on first open. Tests use a
//! single-connection in-memory pool, since each `:memory:` handle is a
//! database of its own.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// How long a connection sits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// How long callers wait for a free pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Unusable database URL {url:?}")]
    BadUrl { url: String },
    #[error("Could not prepare database directory for {path:?}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Database unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
}

fn base_options(url: &str) -> Result<SqliteConnectOptions, ConnectionError> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|_| ConnectionError::BadUrl { url: url.to_string() })?;
    Ok(options
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT))
}

/// Open the database behind `url`, creating the file and its directory when
/// missing, with a pool of up to `max_connections` connections.
pub async fn create_pool(url: &str, max_connections: u32) -> Result<SqlitePool, ConnectionError> {
    prepare_directory(url)?;
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(base_options(url)?.create_if_missing(true))
        .await
        .map_err(ConnectionError::Unavailable)
}

/// In-memory pool for tests.
pub async fn create_test_pool() -> Result<SqlitePool, ConnectionError> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(base_options("sqlite::memory:")?.shared_cache(true))
        .await
        .map_err(ConnectionError::Unavailable)
}

/// Liveness probe for health checks.
pub async fn ping(pool: &SqlitePool) -> Result<(), ConnectionError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(ConnectionError::Unavailable)
}

/// SQLite creates a missing database file but not a missing directory.
fn prepare_directory(url: &str) -> Result<(), ConnectionError> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    if path.is_empty() || path == ":memory:" || path.contains("mode=memory") {
        return Ok(());
    }
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|source| ConnectionError::Directory { path: path.to_string(), source }),
        _ => Ok(()),
    }
}
