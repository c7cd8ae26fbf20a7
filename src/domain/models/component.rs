//! Component domain model.
//!
//! Components are the primary nodes of the knowledge graph: files, functions,
//! requirements, test cases and everything in between.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::errors::{CoreError, CoreResult};

/// What kind of codebase entity a component represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentKind {
    File,
    Function,
    Class,
    Module,
    System,
    Interface,
    Variable,
    Constant,
    Requirement,
    Specification,
    Feature,
    UserStory,
    AcceptanceCriteria,
    TestCase,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "FILE",
            Self::Function => "FUNCTION",
            Self::Class => "CLASS",
            Self::Module => "MODULE",
            Self::System => "SYSTEM",
            Self::Interface => "INTERFACE",
            Self::Variable => "VARIABLE",
            Self::Constant => "CONSTANT",
            Self::Requirement => "REQUIREMENT",
            Self::Specification => "SPECIFICATION",
            Self::Feature => "FEATURE",
            Self::UserStory => "USER_STORY",
            Self::AcceptanceCriteria => "ACCEPTANCE_CRITERIA",
            Self::TestCase => "TEST_CASE",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "FILE" => Some(Self::File),
            "FUNCTION" => Some(Self::Function),
            "CLASS" => Some(Self::Class),
            "MODULE" => Some(Self::Module),
            "SYSTEM" => Some(Self::System),
            "INTERFACE" => Some(Self::Interface),
            "VARIABLE" => Some(Self::Variable),
            "CONSTANT" => Some(Self::Constant),
            "REQUIREMENT" => Some(Self::Requirement),
            "SPECIFICATION" => Some(Self::Specification),
            "FEATURE" => Some(Self::Feature),
            "USER_STORY" => Some(Self::UserStory),
            "ACCEPTANCE_CRITERIA" => Some(Self::AcceptanceCriteria),
            "TEST_CASE" => Some(Self::TestCase),
            _ => None,
        }
    }

    /// All recognized kinds, in declaration order.
    pub fn all() -> &'static [Self] {
        &[
            Self::File,
            Self::Function,
            Self::Class,
            Self::Module,
            Self::System,
            Self::Interface,
            Self::Variable,
            Self::Constant,
            Self::Requirement,
            Self::Specification,
            Self::Feature,
            Self::UserStory,
            Self::AcceptanceCriteria,
            Self::TestCase,
        ]
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar value allowed in entity metadata and command payloads.
///
/// Metadata is a flat string-to-scalar mapping; arbitrary nested trees are
/// rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

/// Flat metadata mapping used across entities.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A node of the codebase knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Opaque unique identifier
    pub id: String,
    /// Entity kind
    pub kind: ComponentKind,
    /// Human-readable name, never empty
    pub name: String,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Source path, when the component maps to one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Codebase tag for multi-repo graphs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codebase: Option<String>,
    /// Flat scalar metadata
    #[serde(default)]
    pub metadata: Metadata,
    /// When created
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// When last updated
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Input for creating a component. An id is minted when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewComponent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub kind: Option<ComponentKind>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub codebase: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewComponent {
    pub fn new(kind: ComponentKind, name: impl Into<String>) -> Self {
        Self { kind: Some(kind), name: name.into(), ..Self::default() }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_codebase(mut self, codebase: impl Into<String>) -> Self {
        self.codebase = Some(codebase.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Check §3 invariants before any mutation happens.
    pub fn validate(&self) -> CoreResult<()> {
        if self.kind.is_none() {
            return Err(CoreError::validation("component kind is required"));
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("component name cannot be empty"));
        }
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(CoreError::validation("component id cannot be blank"));
            }
        }
        Ok(())
    }
}

/// Partial update for a component. The id is immutable; there is no field
/// for it here on purpose.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentPatch {
    #[serde(default)]
    pub kind: Option<ComponentKind>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub codebase: Option<String>,
    /// When present, replaces the whole metadata map.
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl ComponentPatch {
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(CoreError::validation("component name cannot be empty"));
            }
        }
        Ok(())
    }

    /// Merge this patch into an existing component.
    pub fn apply(self, component: &mut Component) {
        if let Some(kind) = self.kind {
            component.kind = kind;
        }
        if let Some(name) = self.name {
            component.name = name;
        }
        if let Some(description) = self.description {
            component.description = Some(description);
        }
        if let Some(path) = self.path {
            component.path = Some(path);
        }
        if let Some(codebase) = self.codebase {
            component.codebase = Some(codebase);
        }
        if let Some(metadata) = self.metadata {
            component.metadata = metadata;
        }
    }
}

/// Filter for component search. All present fields must match.
#[derive(Debug, Clone, Default)]
pub struct ComponentFilter {
    pub kind: Option<ComponentKind>,
    /// Substring match on name.
    pub name: Option<String>,
    pub codebase: Option<String>,
}
