//! SQLite adapters for the graph backend, journal, and snapshot ports.

pub mod connection;
pub mod graph_backend;
pub mod journal_repository;
pub mod migrations;
pub mod snapshot_repository;

pub use connection::{create_pool, create_test_pool, ping, ConnectionError};
pub use graph_backend::SqliteGraphBackend;
pub use journal_repository::SqliteJournalRepository;
pub use migrations::{run_migrations, Migration, MigrationError, MIGRATIONS};
pub use snapshot_repository::SqliteSnapshotRepository;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::errors::{CoreError, CoreResult};

/// Fixed-width UTC timestamp form used in every table, chosen so string
/// comparison in SQL matches chronological comparison.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CoreError::Internal(format!("bad stored timestamp {s:?}: {e}")))
}

pub(crate) fn parse_opt_ts(s: Option<&str>) -> CoreResult<Option<DateTime<Utc>>> {
    s.map(parse_ts).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_format_is_fixed_width_and_sortable() {
        let early = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::microseconds(1);
        let (a, b) = (fmt_ts(early), fmt_ts(late));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn timestamp_round_trips() {
        let now = Utc::now();
        let parsed = parse_ts(&fmt_ts(now)).unwrap();
        // Microsecond precision is retained.
        assert_eq!(fmt_ts(now), fmt_ts(parsed));
    }
}
