//! Change journal port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::CoreResult;
use crate::domain::models::{ChangeEvent, ChangeOperation, JournalStats};

/// Append-only persistence for journal entries.
///
/// Entries are never deleted; snapshot restores and replays leave them
/// untouched. Ordering is by stored timestamp with insertion order breaking
/// ties.
#[async_trait]
pub trait JournalRepository: Send + Sync {
    /// Append one entry. Idempotent on the entry id: re-appending an already
    /// stored id is a no-op.
    async fn append(&self, event: &ChangeEvent) -> CoreResult<()>;

    /// History for one entity, newest first, optionally restricted to one
    /// operation. The limit applies after the operation filter.
    async fn entity_history(
        &self,
        entity_id: &str,
        operation: Option<ChangeOperation>,
        limit: u32,
    ) -> CoreResult<Vec<ChangeEvent>>;

    /// Global feed, newest first, optionally restricted to one operation.
    async fn recent(
        &self,
        limit: u32,
        operation: Option<ChangeOperation>,
    ) -> CoreResult<Vec<ChangeEvent>>;

    /// Entries within [from, to], ascending.
    async fn by_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> CoreResult<Vec<ChangeEvent>>;

    /// Entries for one session, ascending.
    async fn by_session(&self, session_id: &str) -> CoreResult<Vec<ChangeEvent>>;

    /// Entries with timestamp ≤ target, ascending. Replay input.
    async fn up_to(&self, target: DateTime<Utc>) -> CoreResult<Vec<ChangeEvent>>;

    /// Total count, per-operation counts, and per-day counts for the last
    /// 30 days.
    async fn stats(&self) -> CoreResult<JournalStats>;
}
