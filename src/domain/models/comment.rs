//! Comment domain model.
//!
//! Comments are free-text annotations attached to exactly one node (component
//! or task) via an internal HAS_COMMENT edge. Deleting the parent deletes the
//! comment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::component::Metadata;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    /// Id of the node this comment annotates.
    pub parent_id: String,
    pub content: String,
    pub author: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Input for creating a comment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewComment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewComment {
    pub fn new(
        parent_id: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            parent_id: parent_id.into(),
            content: content.into(),
            author: author.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.parent_id.trim().is_empty() {
            return Err(CoreError::validation("comment parent id is required"));
        }
        if self.content.trim().is_empty() {
            return Err(CoreError::validation("comment content cannot be empty"));
        }
        if self.author.trim().is_empty() {
            return Err(CoreError::validation("comment author is required"));
        }
        Ok(())
    }
}
