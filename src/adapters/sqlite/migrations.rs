//! Embedded schema migrations.
//!
//! Revisions are compiled into the binary and applied in version order; the
//! `schema_revisions` table records what has already run, so reopening an
//! existing database is a no-op.

use sqlx::SqlitePool;
use thiserror::Error;

/// One schema revision.
pub struct Migration {
    pub version: i64,
    pub label: &'static str,
    pub sql: &'static str,
}

/// Every embedded revision, ordered by version.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    label: "initial schema",
    sql: include_str!("../../../migrations/001_initial_schema.sql"),
}];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Could not bootstrap the schema_revisions table: {0}")]
    Bootstrap(#[source] sqlx::Error),
    #[error("Could not read the recorded schema version: {0}")]
    Version(#[source] sqlx::Error),
    #[error("Migration {version} ({label}) failed: {source}")]
    StepFailed {
        version: i64,
        label: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Apply every embedded revision newer than the recorded schema version.
/// Returns how many were applied.
pub async fn run_migrations(pool: &SqlitePool) -> Result<usize, MigrationError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_revisions (
            version INTEGER PRIMARY KEY,
            label TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await
    .map_err(MigrationError::Bootstrap)?;

    let (current,): (i64,) =
        sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_revisions")
            .fetch_one(pool)
            .await
            .map_err(MigrationError::Version)?;

    let mut applied = 0;
    for step in MIGRATIONS.iter().filter(|m| m.version > current) {
        sqlx::raw_sql(step.sql).execute(pool).await.map_err(|source| {
            MigrationError::StepFailed { version: step.version, label: step.label, source }
        })?;
        sqlx::query("INSERT INTO schema_revisions (version, label) VALUES (?, ?)")
            .bind(step.version)
            .bind(step.label)
            .execute(pool)
            .await
            .map_err(|source| MigrationError::StepFailed {
                version: step.version,
                label: step.label,
                source,
            })?;
        tracing::debug!(version = step.version, label = step.label, "applied schema migration");
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::connection::create_test_pool;

    #[tokio::test]
    async fn migrations_apply_once() {
        let pool = create_test_pool().await.unwrap();
        assert_eq!(run_migrations(&pool).await.unwrap(), MIGRATIONS.len());
        assert_eq!(run_migrations(&pool).await.unwrap(), 0);
    }

    #[test]
    fn revisions_are_strictly_ordered() {
        for pair in MIGRATIONS.windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
    }
}
