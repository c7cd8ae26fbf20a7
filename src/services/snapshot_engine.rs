//! Snapshot engine: capture, restore, and time-travel replay.
//!
//! Restore and replay operate on the entity graph only. Journal entries and
//! snapshot records are never touched, never journaled, and never produce
//! bus events: both operations rebuild state rather than mutate it.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::clock::{mint_id, Clock};
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    ChangeEvent, ChangeOperation, EntityState, RestoreCounts, Snapshot, SnapshotMeta,
};
use crate::domain::ports::{GraphBackend, JournalRepository, SnapshotRepository};

/// Result of a snapshot restore.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RestoreReport {
    pub snapshot_id: String,
    pub snapshot_name: String,
    pub dry_run: bool,
    pub counts: RestoreCounts,
}

/// One journal entry a replay would apply.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlannedOperation {
    pub event_id: String,
    pub operation: ChangeOperation,
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-entry outcome of a non-dry replay.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReplayOutcome {
    pub event_id: String,
    pub operation: ChangeOperation,
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    pub applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of `replayToTimestamp`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ReplayReport {
    pub target: DateTime<Utc>,
    pub dry_run: bool,
    /// Ordered plan (dry runs only).
    pub planned: Vec<PlannedOperation>,
    /// Per-entry outcomes (non-dry runs only).
    pub outcomes: Vec<ReplayOutcome>,
    pub applied: u64,
    pub failed: u64,
}

pub struct SnapshotEngine {
    backend: Arc<dyn GraphBackend>,
    snapshots: Arc<dyn SnapshotRepository>,
    journal: Arc<dyn JournalRepository>,
    clock: Arc<Clock>,
}

impl SnapshotEngine {
    pub fn new(
        backend: Arc<dyn GraphBackend>,
        snapshots: Arc<dyn SnapshotRepository>,
        journal: Arc<dyn JournalRepository>,
        clock: Arc<Clock>,
    ) -> Self {
        Self { backend, snapshots, journal, clock }
    }

    /// Capture every live entity into a named snapshot. The capture reads
    /// one consistent transaction of the backend.
    pub async fn create_snapshot(
        &self,
        name: &str,
        description: Option<String>,
    ) -> CoreResult<Snapshot> {
        if name.trim().is_empty() {
            return Err(CoreError::validation("snapshot name cannot be empty"));
        }
        let payload = self.backend.dump_graph().await?;
        let snapshot = Snapshot {
            id: mint_id(),
            name: name.to_string(),
            description,
            timestamp: self.clock.now(),
            payload,
        };
        self.snapshots.save(&snapshot).await?;
        tracing::info!(
            snapshot_id = %snapshot.id,
            name = %snapshot.name,
            components = snapshot.payload.components.len(),
            "snapshot captured"
        );
        Ok(snapshot)
    }

    pub async fn list_snapshots(&self) -> CoreResult<Vec<SnapshotMeta>> {
        self.snapshots.list().await
    }

    /// Replace the live graph with a snapshot's payload. Dry runs report the
    /// counts without changing anything.
    pub async fn restore_from_snapshot(
        &self,
        snapshot_id: &str,
        dry_run: bool,
    ) -> CoreResult<RestoreReport> {
        let snapshot = self
            .snapshots
            .get(snapshot_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Snapshot", snapshot_id))?;

        let counts = if dry_run {
            RestoreCounts {
                components: snapshot.payload.components.len() as u64,
                tasks: snapshot.payload.tasks.len() as u64,
                relationships: snapshot.payload.relationships.len() as u64,
                comments: snapshot.payload.comments.len() as u64,
            }
        } else {
            self.backend.restore_graph(&snapshot.payload).await?
        };

        Ok(RestoreReport {
            snapshot_id: snapshot.id,
            snapshot_name: snapshot.name,
            dry_run,
            counts,
        })
    }

    /// Rebuild the graph by applying every journal entry with
    /// `timestamp <= target` in chronological order to a freshly emptied
    /// graph. Individual entry failures are recorded and replay continues.
    pub async fn replay_to_timestamp(
        &self,
        target: DateTime<Utc>,
        dry_run: bool,
    ) -> CoreResult<ReplayReport> {
        let entries = self.journal.up_to(target).await?;

        if dry_run {
            let planned: Vec<PlannedOperation> = entries
                .iter()
                .map(|event| PlannedOperation {
                    event_id: event.id.clone(),
                    operation: event.operation,
                    entity_id: event.entity_id.clone(),
                    timestamp: event.timestamp,
                })
                .collect();
            let count = planned.len() as u64;
            return Ok(ReplayReport {
                target,
                dry_run: true,
                planned,
                outcomes: Vec::new(),
                applied: count,
                failed: 0,
            });
        }

        self.backend.clear_graph().await?;

        let mut outcomes = Vec::with_capacity(entries.len());
        let mut applied = 0u64;
        let mut failed = 0u64;
        for event in &entries {
            let result = self.apply_entry(event).await;
            match result {
                Ok(()) => {
                    applied += 1;
                    outcomes.push(ReplayOutcome {
                        event_id: event.id.clone(),
                        operation: event.operation,
                        entity_id: event.entity_id.clone(),
                        timestamp: event.timestamp,
                        applied: true,
                        error: None,
                    });
                }
                Err(err) => {
                    failed += 1;
                    tracing::warn!(
                        event_id = %event.id,
                        operation = %event.operation,
                        error = %err,
                        "replay entry failed; continuing"
                    );
                    outcomes.push(ReplayOutcome {
                        event_id: event.id.clone(),
                        operation: event.operation,
                        entity_id: event.entity_id.clone(),
                        timestamp: event.timestamp,
                        applied: false,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        Ok(ReplayReport { target, dry_run: false, planned: Vec::new(), outcomes, applied, failed })
    }

    /// Apply one journal entry directly through the backend. Bulk entries
    /// replay as their singular counterparts because each bulk item was
    /// journaled individually.
    async fn apply_entry(&self, event: &ChangeEvent) -> CoreResult<()> {
        match event.operation.replay_as() {
            ChangeOperation::CreateComponent => {
                let component = require_state(event.after_state.as_ref())?
                    .as_component()
                    .ok_or_else(|| state_mismatch(event, "component"))?;
                self.backend.insert_component(component).await
            }
            ChangeOperation::UpdateComponent => {
                let component = require_state(event.after_state.as_ref())?
                    .as_component()
                    .ok_or_else(|| state_mismatch(event, "component"))?;
                self.backend.update_component(component).await
            }
            ChangeOperation::DeleteComponent => {
                self.backend.delete_component_cascade(&event.entity_id).await.map(|_| ())
            }
            ChangeOperation::CreateRelationship => {
                let relationship = require_state(event.after_state.as_ref())?
                    .as_relationship()
                    .ok_or_else(|| state_mismatch(event, "relationship"))?;
                self.backend.insert_relationship(relationship).await
            }
            ChangeOperation::DeleteRelationship => self.replay_relationship_delete(event).await,
            ChangeOperation::CreateTask => {
                let task = require_state(event.after_state.as_ref())?
                    .as_task()
                    .ok_or_else(|| state_mismatch(event, "task"))?;
                self.backend.insert_task(task).await
            }
            ChangeOperation::UpdateTask => {
                let after = require_state(event.after_state.as_ref())?
                    .as_task()
                    .ok_or_else(|| state_mismatch(event, "task"))?;
                let mut task = self
                    .backend
                    .fetch_task(&event.entity_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("Task", &event.entity_id))?;
                task.status = after.status;
                task.progress = after.progress;
                task.updated_at = after.updated_at;
                self.backend.update_task(&task).await
            }
            ChangeOperation::CreateComment => {
                let comment = require_state(event.after_state.as_ref())?
                    .as_comment()
                    .ok_or_else(|| state_mismatch(event, "comment"))?;
                self.backend.insert_comment(comment).await
            }
            ChangeOperation::UpdateComment => {
                let comment = require_state(event.after_state.as_ref())?
                    .as_comment()
                    .ok_or_else(|| state_mismatch(event, "comment"))?;
                self.backend.update_comment(comment).await
            }
            ChangeOperation::DeleteComment => self.backend.delete_comment(&event.entity_id).await,
            // replay_as never returns a bulk variant
            ChangeOperation::CreateComponentsBulk
            | ChangeOperation::CreateRelationshipsBulk
            | ChangeOperation::CreateTasksBulk => Err(CoreError::Internal(format!(
                "bulk operation {} cannot replay directly",
                event.operation
            ))),
        }
    }

    /// Find the edge a DELETE_RELATIONSHIP entry refers to and remove it.
    /// Prefers the exact id; falls back to the before-state triple so edges
    /// re-created under fresh ids during replay still match.
    async fn replay_relationship_delete(&self, event: &ChangeEvent) -> CoreResult<()> {
        if self.backend.fetch_relationship(&event.entity_id).await?.is_some() {
            return self.backend.delete_relationship(&event.entity_id).await;
        }
        let before = event
            .before_state
            .as_ref()
            .and_then(EntityState::as_relationship)
            .ok_or_else(|| CoreError::not_found("Relationship", &event.entity_id))?;
        let found = self
            .backend
            .find_relationship(&before.source_id, &before.target_id, before.rel_type)
            .await?
            .ok_or_else(|| CoreError::not_found("Relationship", &event.entity_id))?;
        self.backend.delete_relationship(&found.id).await
    }
}

fn require_state(state: Option<&EntityState>) -> CoreResult<&EntityState> {
    state.ok_or_else(|| CoreError::Internal("journal entry missing entity state".to_string()))
}

fn state_mismatch(event: &ChangeEvent, expected: &str) -> CoreError {
    CoreError::Internal(format!(
        "journal entry {} for {} carries a non-{expected} state",
        event.id, event.entity_id
    ))
}
