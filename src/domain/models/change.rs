//! Change journal domain model.
//!
//! Every committed mutation of the graph appends exactly one [`ChangeEvent`].
//! Before/after states are typed in memory and serialized to JSON strings
//! only at the storage boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::comment::Comment;
use crate::domain::models::component::{Component, Metadata};
use crate::domain::models::relationship::Relationship;
use crate::domain::models::task::Task;

/// Which mutation a journal entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeOperation {
    CreateComponent,
    UpdateComponent,
    DeleteComponent,
    CreateRelationship,
    DeleteRelationship,
    CreateTask,
    UpdateTask,
    CreateComment,
    UpdateComment,
    DeleteComment,
    CreateComponentsBulk,
    CreateRelationshipsBulk,
    CreateTasksBulk,
}

impl ChangeOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateComponent => "CREATE_COMPONENT",
            Self::UpdateComponent => "UPDATE_COMPONENT",
            Self::DeleteComponent => "DELETE_COMPONENT",
            Self::CreateRelationship => "CREATE_RELATIONSHIP",
            Self::DeleteRelationship => "DELETE_RELATIONSHIP",
            Self::CreateTask => "CREATE_TASK",
            Self::UpdateTask => "UPDATE_TASK",
            Self::CreateComment => "CREATE_COMMENT",
            Self::UpdateComment => "UPDATE_COMMENT",
            Self::DeleteComment => "DELETE_COMMENT",
            Self::CreateComponentsBulk => "CREATE_COMPONENTS_BULK",
            Self::CreateRelationshipsBulk => "CREATE_RELATIONSHIPS_BULK",
            Self::CreateTasksBulk => "CREATE_TASKS_BULK",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CREATE_COMPONENT" => Some(Self::CreateComponent),
            "UPDATE_COMPONENT" => Some(Self::UpdateComponent),
            "DELETE_COMPONENT" => Some(Self::DeleteComponent),
            "CREATE_RELATIONSHIP" => Some(Self::CreateRelationship),
            "DELETE_RELATIONSHIP" => Some(Self::DeleteRelationship),
            "CREATE_TASK" => Some(Self::CreateTask),
            "UPDATE_TASK" => Some(Self::UpdateTask),
            "CREATE_COMMENT" => Some(Self::CreateComment),
            "UPDATE_COMMENT" => Some(Self::UpdateComment),
            "DELETE_COMMENT" => Some(Self::DeleteComment),
            "CREATE_COMPONENTS_BULK" => Some(Self::CreateComponentsBulk),
            "CREATE_RELATIONSHIPS_BULK" => Some(Self::CreateRelationshipsBulk),
            "CREATE_TASKS_BULK" => Some(Self::CreateTasksBulk),
            _ => None,
        }
    }

    /// The non-bulk operation this entry replays as.
    pub fn replay_as(&self) -> Self {
        match self {
            Self::CreateComponentsBulk => Self::CreateComponent,
            Self::CreateRelationshipsBulk => Self::CreateRelationship,
            Self::CreateTasksBulk => Self::CreateTask,
            other => *other,
        }
    }
}

impl std::fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which entity family a journal entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Component,
    Relationship,
    Task,
    Comment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Component => "COMPONENT",
            Self::Relationship => "RELATIONSHIP",
            Self::Task => "TASK",
            Self::Comment => "COMMENT",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "COMPONENT" => Some(Self::Component),
            "RELATIONSHIP" => Some(Self::Relationship),
            "TASK" => Some(Self::Task),
            "COMMENT" => Some(Self::Comment),
            _ => None,
        }
    }
}

/// Typed before/after state of a journal entry.
///
/// The journal stores these as JSON strings; the entity kind column selects
/// the decode target, so the wire form is the bare entity record without a
/// discriminant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntityState {
    Component(Component),
    Relationship(Relationship),
    Task(Task),
    Comment(Comment),
}

impl EntityState {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Component(_) => EntityKind::Component,
            Self::Relationship(_) => EntityKind::Relationship,
            Self::Task(_) => EntityKind::Task,
            Self::Comment(_) => EntityKind::Comment,
        }
    }

    /// Serialize to the journal's JSON string form.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from the journal's JSON string form, guided by the stored kind.
    pub fn decode(kind: EntityKind, json: &str) -> CoreResult<Self> {
        Ok(match kind {
            EntityKind::Component => Self::Component(serde_json::from_str(json)?),
            EntityKind::Relationship => Self::Relationship(serde_json::from_str(json)?),
            EntityKind::Task => Self::Task(serde_json::from_str(json)?),
            EntityKind::Comment => Self::Comment(serde_json::from_str(json)?),
        })
    }

    pub fn as_component(&self) -> Option<&Component> {
        match self {
            Self::Component(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Self::Relationship(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Self::Task(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_comment(&self) -> Option<&Comment> {
        match self {
            Self::Comment(c) => Some(c),
            _ => None,
        }
    }
}

/// Who and what produced a change, stamped onto every journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub source: String,
}

impl Default for Provenance {
    fn default() -> Self {
        Self { session_id: "local".to_string(), user_id: None, source: "core".to_string() }
    }
}

impl Provenance {
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), ..Self::default() }
    }
}

/// One journal entry.
///
/// Invariants: CREATE entries have no before state, DELETE entries have no
/// after state, UPDATE entries have both; timestamps are strictly increasing
/// within a process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub id: String,
    pub operation: ChangeOperation,
    pub entity_kind: EntityKind,
    pub entity_id: String,
    pub before_state: Option<EntityState>,
    pub after_state: Option<EntityState>,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub user_id: Option<String>,
    pub source: String,
    pub metadata: Metadata,
}

impl ChangeEvent {
    /// Metadata stamped onto each entry of a bulk mutation.
    pub fn bulk_metadata(total_count: usize) -> Metadata {
        let mut metadata = BTreeMap::new();
        metadata.insert("bulkOperation".to_string(), true.into());
        metadata.insert("totalCount".to_string(), (total_count as i64).into());
        metadata
    }

    /// Sanity-check the before/after shape against the operation.
    pub fn validate(&self) -> CoreResult<()> {
        let is_create = matches!(
            self.operation,
            ChangeOperation::CreateComponent
                | ChangeOperation::CreateRelationship
                | ChangeOperation::CreateTask
                | ChangeOperation::CreateComment
                | ChangeOperation::CreateComponentsBulk
                | ChangeOperation::CreateRelationshipsBulk
                | ChangeOperation::CreateTasksBulk
        );
        let is_delete = matches!(
            self.operation,
            ChangeOperation::DeleteComponent
                | ChangeOperation::DeleteRelationship
                | ChangeOperation::DeleteComment
        );
        if is_create && self.before_state.is_some() {
            return Err(CoreError::validation("CREATE entries carry no before state"));
        }
        if is_delete && self.after_state.is_some() {
            return Err(CoreError::validation("DELETE entries carry no after state"));
        }
        if !is_create && !is_delete && (self.before_state.is_none() || self.after_state.is_none()) {
            return Err(CoreError::validation("UPDATE entries carry both states"));
        }
        Ok(())
    }
}

/// Aggregate statistics over the whole journal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalStats {
    pub total: u64,
    /// Entry count per operation name.
    pub by_operation: BTreeMap<String, u64>,
    /// Entry count per UTC day (YYYY-MM-DD) over the last 30 days.
    pub by_day: BTreeMap<String, u64>,
}
