//! Read-side service over the change journal.
//!
//! Writes happen inside the graph store, which appends through the journal
//! port after each committed mutation; this service answers history queries
//! for transports.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{ChangeEvent, ChangeOperation, JournalStats};
use crate::domain::ports::JournalRepository;

/// Query shape for `getChangeHistory`.
#[derive(Debug, Clone, Default)]
pub struct ChangeHistoryQuery {
    /// Restrict to one entity's history.
    pub entity_id: Option<String>,
    /// Restrict to one operation.
    pub operation: Option<ChangeOperation>,
    /// Max entries; defaults to 100, capped at 1000.
    pub limit: Option<u32>,
}

pub struct ChangeJournal {
    repo: Arc<dyn JournalRepository>,
}

impl ChangeJournal {
    pub const DEFAULT_LIMIT: u32 = 100;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(repo: Arc<dyn JournalRepository>) -> Self {
        Self { repo }
    }

    fn effective_limit(limit: Option<u32>) -> CoreResult<u32> {
        match limit {
            None => Ok(Self::DEFAULT_LIMIT),
            Some(limit) if limit >= 1 && limit <= Self::MAX_LIMIT => Ok(limit),
            Some(limit) => Err(CoreError::validation(format!(
                "limit must be within 1..={}, got {limit}",
                Self::MAX_LIMIT
            ))),
        }
    }

    /// History feed, newest first. With an entity id this is that entity's
    /// history; otherwise the global feed. An operation filter applies to
    /// either form.
    pub async fn get_change_history(
        &self,
        query: ChangeHistoryQuery,
    ) -> CoreResult<Vec<ChangeEvent>> {
        let limit = Self::effective_limit(query.limit)?;
        match query.entity_id {
            Some(entity_id) => {
                self.repo.entity_history(&entity_id, query.operation, limit).await
            }
            None => self.repo.recent(limit, query.operation).await,
        }
    }

    /// Entries within [from, to], ascending; bounds are inclusive.
    pub async fn get_changes_by_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<u32>,
    ) -> CoreResult<Vec<ChangeEvent>> {
        if to < from {
            return Err(CoreError::validation("time range end precedes start"));
        }
        let limit = Self::effective_limit(limit)?;
        self.repo.by_time_range(from, to, limit).await
    }

    /// Every entry stamped with a session id, ascending.
    pub async fn get_session_changes(&self, session_id: &str) -> CoreResult<Vec<ChangeEvent>> {
        self.repo.by_session(session_id).await
    }

    pub async fn get_stats(&self) -> CoreResult<JournalStats> {
        self.repo.stats().await
    }
}
