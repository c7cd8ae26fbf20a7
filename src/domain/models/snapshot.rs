//! Snapshot domain model.
//!
//! A snapshot is a labeled, self-contained capture of every live entity in
//! the graph. Restoring a snapshot reproduces the graph without consulting
//! the change journal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::comment::Comment;
use crate::domain::models::component::Component;
use crate::domain::models::relationship::Relationship;
use crate::domain::models::task::Task;

/// Dense serialized form of all live entities at capture time.
///
/// Relationships include only user-visible edges; internal RELATES_TO links
/// are reconstructed from each task's `related_component_ids` and HAS_COMMENT
/// attachments from each comment's `parent_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDump {
    pub components: Vec<Component>,
    pub tasks: Vec<Task>,
    pub comments: Vec<Comment>,
    pub relationships: Vec<Relationship>,
}

impl GraphDump {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
            && self.tasks.is_empty()
            && self.comments.is_empty()
            && self.relationships.is_empty()
    }
}

/// A labeled capture of the entire graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub payload: GraphDump,
}

impl Snapshot {
    pub fn meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            timestamp: self.timestamp,
            component_count: self.payload.components.len() as u64,
            task_count: self.payload.tasks.len() as u64,
            comment_count: self.payload.comments.len() as u64,
            relationship_count: self.payload.relationships.len() as u64,
        }
    }
}

/// Snapshot listing row: everything but the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub component_count: u64,
    pub task_count: u64,
    pub comment_count: u64,
    pub relationship_count: u64,
}

/// Per-entity-family counts reported by a restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreCounts {
    pub components: u64,
    pub tasks: u64,
    pub relationships: u64,
    pub comments: u64,
}
