//! Graph backend port.
//!
//! A thin transactional adapter over the external graph engine. Every method
//! that touches more than one row runs inside a single backend transaction;
//! callers (the graph store) must treat each call as possibly suspending on
//! I/O. The backend enforces id uniqueness and referential checks; semantic
//! validation lives above in the store.

use async_trait::async_trait;

use crate::domain::errors::CoreResult;
use crate::domain::models::{
    Comment, Component, ComponentFilter, ComponentRelation, Direction, GraphDump, Relationship,
    RelationshipType, RestoreCounts, Task, TaskSearch, TaskStatus,
};

/// What a cascade delete removed alongside the component itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub relationships_removed: u64,
    pub comments_removed: u64,
}

/// One row of a codebase overview.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KindCount {
    pub kind: String,
    pub count: u64,
}

/// Transactional access to the persistent graph.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    // --- components -------------------------------------------------------

    /// Insert a component. Duplicate ids surface CONFLICT.
    async fn insert_component(&self, component: &Component) -> CoreResult<()>;

    async fn fetch_component(&self, id: &str) -> CoreResult<Option<Component>>;

    /// Overwrite a stored component. NOT_FOUND when the id is absent.
    async fn update_component(&self, component: &Component) -> CoreResult<()>;

    /// Delete a component together with all incident edges and attached
    /// comments, in one transaction.
    async fn delete_component_cascade(&self, id: &str) -> CoreResult<CascadeReport>;

    /// Filtered search, capped at `limit` rows.
    async fn search_components(
        &self,
        filter: &ComponentFilter,
        limit: u32,
    ) -> CoreResult<Vec<Component>>;

    // --- relationships ----------------------------------------------------

    /// Insert an edge after verifying both endpoints exist, in one
    /// transaction.
    async fn insert_relationship(&self, relationship: &Relationship) -> CoreResult<()>;

    async fn fetch_relationship(&self, id: &str) -> CoreResult<Option<Relationship>>;

    /// Delete an edge by id. NOT_FOUND when absent.
    async fn delete_relationship(&self, id: &str) -> CoreResult<()>;

    /// Find one edge matching (source, target, type), if any.
    async fn find_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        rel_type: RelationshipType,
    ) -> CoreResult<Option<Relationship>>;

    /// User-visible edges incident to a component, with the neighbor record
    /// joined in. Internal edge types are excluded.
    async fn component_relations(
        &self,
        component_id: &str,
        direction: Direction,
    ) -> CoreResult<Vec<ComponentRelation>>;

    /// Outgoing DEPENDS_ON pairs (source, target) for a set of source ids.
    /// Used level-by-level for bounded dependency-tree expansion.
    async fn depends_on_edges_from(&self, source_ids: &[String]) -> CoreResult<Vec<(String, String)>>;

    // --- tasks ------------------------------------------------------------

    /// Insert a task and its RELATES_TO links in one transaction, verifying
    /// the related components exist.
    async fn insert_task(&self, task: &Task) -> CoreResult<()>;

    async fn fetch_task(&self, id: &str) -> CoreResult<Option<Task>>;

    /// Overwrite a stored task (RELATES_TO links are not changed here).
    async fn update_task(&self, task: &Task) -> CoreResult<()>;

    async fn list_tasks(&self, status: Option<TaskStatus>) -> CoreResult<Vec<Task>>;

    async fn search_tasks(&self, search: &TaskSearch) -> CoreResult<Vec<Task>>;

    // --- comments ---------------------------------------------------------

    /// Insert a comment and its HAS_COMMENT attachment in one transaction,
    /// verifying the parent node exists (component or task).
    async fn insert_comment(&self, comment: &Comment) -> CoreResult<()>;

    async fn fetch_comment(&self, id: &str) -> CoreResult<Option<Comment>>;

    async fn update_comment(&self, comment: &Comment) -> CoreResult<()>;

    /// Delete a comment and its attachment edge.
    async fn delete_comment(&self, id: &str) -> CoreResult<()>;

    /// Comments attached to a node, newest first.
    async fn comments_for(&self, node_id: &str, limit: u32) -> CoreResult<Vec<Comment>>;

    // --- bulk -------------------------------------------------------------

    /// All-or-nothing insert of many components in one transaction.
    async fn insert_components_bulk(&self, components: &[Component]) -> CoreResult<()>;

    /// All-or-nothing insert of many relationships in one transaction,
    /// verifying every endpoint.
    async fn insert_relationships_bulk(&self, relationships: &[Relationship]) -> CoreResult<()>;

    /// All-or-nothing insert of many tasks (with RELATES_TO links) in one
    /// transaction.
    async fn insert_tasks_bulk(&self, tasks: &[Task]) -> CoreResult<()>;

    // --- analysis ---------------------------------------------------------

    /// Per-kind component counts for a codebase, sorted by count descending.
    async fn codebase_kind_counts(&self, codebase: &str) -> CoreResult<Vec<KindCount>>;

    /// User-visible relationship count among a codebase's components.
    async fn codebase_relationship_count(&self, codebase: &str) -> CoreResult<u64>;

    // --- snapshot & replay support ---------------------------------------

    /// Every live entity: all components, tasks, comments, and user-visible
    /// relationships. Journal and snapshot records are not entities.
    async fn dump_graph(&self) -> CoreResult<GraphDump>;

    /// Delete every entity, leaving journal entries and snapshots untouched.
    async fn clear_graph(&self) -> CoreResult<()>;

    /// Clear and re-create the graph from a dump in one transaction:
    /// components, then tasks, then relationships, then comments.
    async fn restore_graph(&self, dump: &GraphDump) -> CoreResult<RestoreCounts>;
}
