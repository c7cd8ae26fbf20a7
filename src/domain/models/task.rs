//! Task domain model.
//!
//! Tasks are tracked units of work, optionally linked to the components they
//! touch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::component::Metadata;

/// Status of a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Blocked,
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Todo
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
            Self::Blocked => "BLOCKED",
            Self::Cancelled => "CANCELLED",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "TODO" => Some(Self::Todo),
            "IN_PROGRESS" => Some(Self::InProgress),
            "DONE" => Some(Self::Done),
            "BLOCKED" => Some(Self::Blocked),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Never empty
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    /// Completion fraction in [0, 1]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codebase: Option<String>,
    /// Components this task touches, linked via internal RELATES_TO edges
    #[serde(default)]
    pub related_component_ids: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub codebase: Option<String>,
    #[serde(default)]
    pub related_component_ids: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_related(mut self, component_ids: Vec<String>) -> Self {
        self.related_component_ids = component_ids;
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("task name cannot be empty"));
        }
        if let Some(progress) = self.progress {
            validate_progress(progress)?;
        }
        Ok(())
    }
}

/// Shared progress bound check.
pub(crate) fn validate_progress(progress: f64) -> CoreResult<()> {
    if !(0.0..=1.0).contains(&progress) || progress.is_nan() {
        return Err(CoreError::validation(format!(
            "progress must be within [0, 1], got {progress}"
        )));
    }
    Ok(())
}

/// Sort key for task search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOrder {
    Created,
    Name,
    Status,
    Progress,
}

impl Default for TaskOrder {
    fn default() -> Self {
        Self::Created
    }
}

/// Sort direction for task search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl Default for OrderDirection {
    fn default() -> Self {
        Self::Desc
    }
}

/// Search criteria for tasks. All present fields must match.
#[derive(Debug, Clone, Default)]
pub struct TaskSearch {
    /// Substring match on name or description.
    pub text_query: Option<String>,
    /// Accept any of these statuses; empty accepts all.
    pub statuses: Vec<TaskStatus>,
    pub progress_min: Option<f64>,
    pub progress_max: Option<f64>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    /// Tasks related to any of these components; empty accepts all.
    pub related_component_ids: Vec<String>,
    pub order_by: TaskOrder,
    pub order_direction: OrderDirection,
    /// At most [`TaskSearch::MAX_LIMIT`]; None means the default of 100.
    pub limit: Option<u32>,
}

impl TaskSearch {
    pub const DEFAULT_LIMIT: u32 = 100;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn validate(&self) -> CoreResult<()> {
        if let Some(limit) = self.limit {
            if limit == 0 || limit > Self::MAX_LIMIT {
                return Err(CoreError::validation(format!(
                    "limit must be within 1..={}, got {limit}",
                    Self::MAX_LIMIT
                )));
            }
        }
        for bound in [self.progress_min, self.progress_max].into_iter().flatten() {
            validate_progress(bound)?;
        }
        Ok(())
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}
