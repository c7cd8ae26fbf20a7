//! Relationship domain model.
//!
//! Relationships are directed, typed edges between components. Two edge types
//! are internal plumbing and never surfaced to callers: `HAS_COMMENT` (node to
//! comment attachment) and `RELATES_TO` (task to component links).

use serde::{Deserialize, Serialize};

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::component::{Component, Metadata};

/// Edge type of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    DependsOn,
    Implements,
    Extends,
    Contains,
    Calls,
    Imports,
    Exports,
    Overrides,
    Uses,
    Creates,
    Satisfies,
    DerivesFrom,
    Refines,
    TracesTo,
    Validates,
    Verifies,
    ConflictsWith,
    Supports,
    AllocatesTo,
    Realizes,
    Precedes,
    Follows,
    Concurrent,
    /// Internal: attaches a comment to its parent node.
    HasComment,
    /// Internal: links a task to a related component.
    RelatesTo,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DependsOn => "DEPENDS_ON",
            Self::Implements => "IMPLEMENTS",
            Self::Extends => "EXTENDS",
            Self::Contains => "CONTAINS",
            Self::Calls => "CALLS",
            Self::Imports => "IMPORTS",
            Self::Exports => "EXPORTS",
            Self::Overrides => "OVERRIDES",
            Self::Uses => "USES",
            Self::Creates => "CREATES",
            Self::Satisfies => "SATISFIES",
            Self::DerivesFrom => "DERIVES_FROM",
            Self::Refines => "REFINES",
            Self::TracesTo => "TRACES_TO",
            Self::Validates => "VALIDATES",
            Self::Verifies => "VERIFIES",
            Self::ConflictsWith => "CONFLICTS_WITH",
            Self::Supports => "SUPPORTS",
            Self::AllocatesTo => "ALLOCATES_TO",
            Self::Realizes => "REALIZES",
            Self::Precedes => "PRECEDES",
            Self::Follows => "FOLLOWS",
            Self::Concurrent => "CONCURRENT",
            Self::HasComment => "HAS_COMMENT",
            Self::RelatesTo => "RELATES_TO",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DEPENDS_ON" => Some(Self::DependsOn),
            "IMPLEMENTS" => Some(Self::Implements),
            "EXTENDS" => Some(Self::Extends),
            "CONTAINS" => Some(Self::Contains),
            "CALLS" => Some(Self::Calls),
            "IMPORTS" => Some(Self::Imports),
            "EXPORTS" => Some(Self::Exports),
            "OVERRIDES" => Some(Self::Overrides),
            "USES" => Some(Self::Uses),
            "CREATES" => Some(Self::Creates),
            "SATISFIES" => Some(Self::Satisfies),
            "DERIVES_FROM" => Some(Self::DerivesFrom),
            "REFINES" => Some(Self::Refines),
            "TRACES_TO" => Some(Self::TracesTo),
            "VALIDATES" => Some(Self::Validates),
            "VERIFIES" => Some(Self::Verifies),
            "CONFLICTS_WITH" => Some(Self::ConflictsWith),
            "SUPPORTS" => Some(Self::Supports),
            "ALLOCATES_TO" => Some(Self::AllocatesTo),
            "REALIZES" => Some(Self::Realizes),
            "PRECEDES" => Some(Self::Precedes),
            "FOLLOWS" => Some(Self::Follows),
            "CONCURRENT" => Some(Self::Concurrent),
            "HAS_COMMENT" => Some(Self::HasComment),
            "RELATES_TO" => Some(Self::RelatesTo),
            _ => None,
        }
    }

    /// Whether this edge type is internal plumbing, hidden from
    /// relationship queries and snapshots.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::HasComment | Self::RelatesTo)
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional temporal annotation on a relationship: where the edge sits in an
/// ordering of events, with what confidence, and why.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalHint {
    /// 1-based position in a temporal ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_order: Option<u32>,
    /// Confidence in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl TemporalHint {
    pub fn is_empty(&self) -> bool {
        self.time_order.is_none() && self.probability.is_none() && self.reasoning.is_none()
    }

    pub fn validate(&self) -> CoreResult<()> {
        if let Some(order) = self.time_order {
            if order < 1 {
                return Err(CoreError::validation("timeOrder must be a positive integer"));
            }
        }
        if let Some(p) = self.probability {
            if !(0.0..=1.0).contains(&p) || p.is_nan() {
                return Err(CoreError::validation(format!(
                    "probability must be within [0, 1], got {p}"
                )));
            }
        }
        Ok(())
    }
}

/// A directed, typed edge between two components.
///
/// Parallel edges are allowed: (source, target, type) carries no uniqueness
/// constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    #[serde(rename = "type")]
    pub rel_type: RelationshipType,
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub details: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<TemporalHint>,
}

/// Input for creating a relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRelationship {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub rel_type: RelationshipType,
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub details: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<TemporalHint>,
}

impl NewRelationship {
    pub fn new(
        rel_type: RelationshipType,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            rel_type,
            source_id: source_id.into(),
            target_id: target_id.into(),
            details: Metadata::new(),
            temporal: None,
        }
    }

    pub fn with_temporal(mut self, temporal: TemporalHint) -> Self {
        self.temporal = Some(temporal);
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.rel_type.is_internal() {
            return Err(CoreError::validation(format!(
                "relationship type {} is reserved for internal use",
                self.rel_type
            )));
        }
        if self.source_id.trim().is_empty() || self.target_id.trim().is_empty() {
            return Err(CoreError::validation("relationship endpoints cannot be blank"));
        }
        if let Some(temporal) = &self.temporal {
            temporal.validate()?;
        }
        Ok(())
    }
}

/// Direction selector for relationship queries relative to a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
            Self::Both => "both",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "incoming" => Some(Self::Incoming),
            "outgoing" => Some(Self::Outgoing),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

/// One row of a relationship query: the edge, the component on the far end,
/// and which way the edge points relative to the queried component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentRelation {
    pub relationship: Relationship,
    pub neighbor: Component,
    pub direction: Direction,
}
