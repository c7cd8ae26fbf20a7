//! SQLite implementation of the change journal port.
//!
//! Rows in `change_events` are append-only. Before/after states are stored
//! as JSON strings and decoded against the entity kind column on read.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use sqlx::SqlitePool;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    ChangeEvent, ChangeOperation, EntityKind, EntityState, JournalStats,
};
use crate::domain::ports::JournalRepository;

use super::{fmt_ts, parse_ts};

#[derive(Clone)]
pub struct SqliteJournalRepository {
    pool: SqlitePool,
}

impl SqliteJournalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_events(&self, query: &str, bindings: &[String]) -> CoreResult<Vec<ChangeEvent>> {
        let mut q = sqlx::query_as::<_, ChangeRow>(query);
        for binding in bindings {
            q = q.bind(binding);
        }
        let rows: Vec<ChangeRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl JournalRepository for SqliteJournalRepository {
    async fn append(&self, event: &ChangeEvent) -> CoreResult<()> {
        event.validate()?;
        let before_json = event.before_state.as_ref().map(EntityState::to_json).transpose()?;
        let after_json = event.after_state.as_ref().map(EntityState::to_json).transpose()?;
        let metadata_json = serde_json::to_string(&event.metadata)?;

        // Idempotent on id: concurrent or repeated appends of the same entry
        // leave a single row.
        sqlx::query(
            r#"INSERT OR IGNORE INTO change_events
               (id, operation, entity_kind, entity_id, before_state, after_state,
                timestamp, session_id, user_id, source, metadata)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&event.id)
        .bind(event.operation.as_str())
        .bind(event.entity_kind.as_str())
        .bind(&event.entity_id)
        .bind(&before_json)
        .bind(&after_json)
        .bind(fmt_ts(event.timestamp))
        .bind(&event.session_id)
        .bind(&event.user_id)
        .bind(&event.source)
        .bind(&metadata_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn entity_history(
        &self,
        entity_id: &str,
        operation: Option<ChangeOperation>,
        limit: u32,
    ) -> CoreResult<Vec<ChangeEvent>> {
        match operation {
            Some(operation) => {
                self.fetch_events(
                    &format!(
                        "SELECT * FROM change_events WHERE entity_id = ? AND operation = ?
                         ORDER BY timestamp DESC, rowid DESC LIMIT {limit}"
                    ),
                    &[entity_id.to_string(), operation.as_str().to_string()],
                )
                .await
            }
            None => {
                self.fetch_events(
                    &format!(
                        "SELECT * FROM change_events WHERE entity_id = ?
                         ORDER BY timestamp DESC, rowid DESC LIMIT {limit}"
                    ),
                    &[entity_id.to_string()],
                )
                .await
            }
        }
    }

    async fn recent(
        &self,
        limit: u32,
        operation: Option<ChangeOperation>,
    ) -> CoreResult<Vec<ChangeEvent>> {
        match operation {
            Some(operation) => {
                self.fetch_events(
                    &format!(
                        "SELECT * FROM change_events WHERE operation = ?
                         ORDER BY timestamp DESC, rowid DESC LIMIT {limit}"
                    ),
                    &[operation.as_str().to_string()],
                )
                .await
            }
            None => {
                self.fetch_events(
                    &format!(
                        "SELECT * FROM change_events
                         ORDER BY timestamp DESC, rowid DESC LIMIT {limit}"
                    ),
                    &[],
                )
                .await
            }
        }
    }

    async fn by_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> CoreResult<Vec<ChangeEvent>> {
        self.fetch_events(
            &format!(
                "SELECT * FROM change_events WHERE timestamp >= ? AND timestamp <= ?
                 ORDER BY timestamp ASC, rowid ASC LIMIT {limit}"
            ),
            &[fmt_ts(from), fmt_ts(to)],
        )
        .await
    }

    async fn by_session(&self, session_id: &str) -> CoreResult<Vec<ChangeEvent>> {
        self.fetch_events(
            "SELECT * FROM change_events WHERE session_id = ?
             ORDER BY timestamp ASC, rowid ASC",
            &[session_id.to_string()],
        )
        .await
    }

    async fn up_to(&self, target: DateTime<Utc>) -> CoreResult<Vec<ChangeEvent>> {
        self.fetch_events(
            "SELECT * FROM change_events WHERE timestamp <= ?
             ORDER BY timestamp ASC, rowid ASC",
            &[fmt_ts(target)],
        )
        .await
    }

    async fn stats(&self) -> CoreResult<JournalStats> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM change_events")
            .fetch_one(&self.pool)
            .await?;

        let operation_rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT operation, COUNT(*) FROM change_events GROUP BY operation")
                .fetch_all(&self.pool)
                .await?;
        let by_operation: BTreeMap<String, u64> = operation_rows
            .into_iter()
            .map(|(op, count)| (op, count as u64))
            .collect();

        let cutoff = fmt_ts(Utc::now() - Duration::days(30));
        let day_rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT substr(timestamp, 1, 10) AS day, COUNT(*) FROM change_events
             WHERE timestamp >= ? GROUP BY day ORDER BY day",
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await?;
        let by_day: BTreeMap<String, u64> =
            day_rows.into_iter().map(|(day, count)| (day, count as u64)).collect();

        Ok(JournalStats { total: total as u64, by_operation, by_day })
    }
}

#[derive(sqlx::FromRow)]
struct ChangeRow {
    id: String,
    operation: String,
    entity_kind: String,
    entity_id: String,
    before_state: Option<String>,
    after_state: Option<String>,
    timestamp: String,
    session_id: String,
    user_id: Option<String>,
    source: String,
    metadata: String,
}

impl TryFrom<ChangeRow> for ChangeEvent {
    type Error = CoreError;

    fn try_from(row: ChangeRow) -> CoreResult<Self> {
        let operation = ChangeOperation::from_str(&row.operation).ok_or_else(|| {
            CoreError::Internal(format!("unknown journal operation {:?}", row.operation))
        })?;
        let entity_kind = EntityKind::from_str(&row.entity_kind).ok_or_else(|| {
            CoreError::Internal(format!("unknown journal entity kind {:?}", row.entity_kind))
        })?;
        let before_state = row
            .before_state
            .as_deref()
            .map(|json| EntityState::decode(entity_kind, json))
            .transpose()?;
        let after_state = row
            .after_state
            .as_deref()
            .map(|json| EntityState::decode(entity_kind, json))
            .transpose()?;
        Ok(Self {
            id: row.id,
            operation,
            entity_kind,
            entity_id: row.entity_id,
            before_state,
            after_state,
            timestamp: parse_ts(&row.timestamp)?,
            session_id: row.session_id,
            user_id: row.user_id,
            source: row.source,
            metadata: serde_json::from_str(&row.metadata)?,
        })
    }
}
