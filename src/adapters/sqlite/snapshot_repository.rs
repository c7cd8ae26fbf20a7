//! SQLite implementation of the snapshot storage port.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{Snapshot, SnapshotMeta};
use crate::domain::ports::SnapshotRepository;

use super::{fmt_ts, parse_ts};

#[derive(Clone)]
pub struct SqliteSnapshotRepository {
    pool: SqlitePool,
}

impl SqliteSnapshotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotRepository for SqliteSnapshotRepository {
    async fn save(&self, snapshot: &Snapshot) -> CoreResult<()> {
        let payload_json = serde_json::to_string(&snapshot.payload)?;
        sqlx::query(
            r#"INSERT INTO snapshots
               (id, name, description, timestamp, component_count, task_count,
                comment_count, relationship_count, payload)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&snapshot.id)
        .bind(&snapshot.name)
        .bind(&snapshot.description)
        .bind(fmt_ts(snapshot.timestamp))
        .bind(snapshot.payload.components.len() as i64)
        .bind(snapshot.payload.tasks.len() as i64)
        .bind(snapshot.payload.comments.len() as i64)
        .bind(snapshot.payload.relationships.len() as i64)
        .bind(&payload_json)
        .execute(&self.pool)
        .await
        .map_err(|e| match CoreError::from(e) {
            CoreError::Conflict(_) => {
                CoreError::Conflict(format!("Snapshot already exists: {}", snapshot.id))
            }
            other => other,
        })?;
        Ok(())
    }

    async fn list(&self) -> CoreResult<Vec<SnapshotMeta>> {
        let rows: Vec<SnapshotMetaRow> = sqlx::query_as(
            r#"SELECT id, name, description, timestamp, component_count, task_count,
               comment_count, relationship_count
               FROM snapshots ORDER BY timestamp DESC, rowid DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get(&self, id: &str) -> CoreResult<Option<Snapshot>> {
        let row: Option<SnapshotRow> = sqlx::query_as("SELECT * FROM snapshots WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotMetaRow {
    id: String,
    name: String,
    description: Option<String>,
    timestamp: String,
    component_count: i64,
    task_count: i64,
    comment_count: i64,
    relationship_count: i64,
}

impl TryFrom<SnapshotMetaRow> for SnapshotMeta {
    type Error = CoreError;

    fn try_from(row: SnapshotMetaRow) -> CoreResult<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            timestamp: parse_ts(&row.timestamp)?,
            component_count: row.component_count as u64,
            task_count: row.task_count as u64,
            comment_count: row.comment_count as u64,
            relationship_count: row.relationship_count as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: String,
    name: String,
    description: Option<String>,
    timestamp: String,
    #[allow(dead_code)]
    component_count: i64,
    #[allow(dead_code)]
    task_count: i64,
    #[allow(dead_code)]
    comment_count: i64,
    #[allow(dead_code)]
    relationship_count: i64,
    payload: String,
}

impl TryFrom<SnapshotRow> for Snapshot {
    type Error = CoreError;

    fn try_from(row: SnapshotRow) -> CoreResult<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            timestamp: parse_ts(&row.timestamp)?,
            payload: serde_json::from_str(&row.payload)?,
        })
    }
}
