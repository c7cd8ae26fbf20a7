//! Graph store: validated CRUD over the knowledge graph.
//!
//! Every mutation validates its input first, commits through the graph
//! backend, then appends exactly one journal entry per committed entity and
//! publishes the matching bus event. Bulk operations commit all-or-nothing;
//! their journal entries land only after the single commit, in input order.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::clock::{mint_id, Clock};
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::task::validate_progress;
use crate::domain::models::{
    ChangeEvent, ChangeOperation, Comment, Component, ComponentFilter, ComponentPatch,
    ComponentRelation, Direction, EntityKind, EntityState, Metadata, NewComment, NewComponent,
    NewRelationship, NewTask, Provenance, Relationship, Task, TaskSearch, TaskStatus,
};
use crate::domain::ports::{GraphBackend, JournalRepository, KindCount};
use crate::services::event_bus::{EventBus, GraphEvent};

/// Hard cap on component search results.
pub const COMPONENT_SEARCH_LIMIT: u32 = 100;

/// Default depth bound for dependency-tree expansion.
pub const DEFAULT_DEPENDENCY_DEPTH: u32 = 3;

/// Default page size for node comment listings.
pub const DEFAULT_COMMENT_LIMIT: u32 = 100;

/// Aggregate view of one codebase.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CodebaseOverview {
    pub codebase: String,
    /// Per-kind component counts, sorted by count descending.
    pub kinds: Vec<KindCount>,
    pub total_components: u64,
    pub relationship_count: u64,
}

/// Validated CRUD + query surface over the graph backend.
#[derive(Clone)]
pub struct GraphStore {
    backend: Arc<dyn GraphBackend>,
    journal: Arc<dyn JournalRepository>,
    bus: Arc<EventBus>,
    clock: Arc<Clock>,
    provenance: Provenance,
}

impl GraphStore {
    pub fn new(
        backend: Arc<dyn GraphBackend>,
        journal: Arc<dyn JournalRepository>,
        bus: Arc<EventBus>,
        clock: Arc<Clock>,
    ) -> Self {
        Self { backend, journal, bus, clock, provenance: Provenance::default() }
    }

    /// A view of the store stamping journal entries for a given session.
    pub fn with_session(&self, provenance: Provenance) -> Self {
        Self { provenance, ..self.clone() }
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    // --- components -------------------------------------------------------

    pub async fn create_component(&self, input: NewComponent) -> CoreResult<Component> {
        input.validate()?;
        let now = self.clock.now();
        let component = build_component(input, now)?;
        self.backend.insert_component(&component).await?;
        self.journal_entry(
            ChangeOperation::CreateComponent,
            EntityKind::Component,
            &component.id,
            None,
            Some(EntityState::Component(component.clone())),
            Metadata::new(),
        )
        .await?;
        self.bus.publish(&GraphEvent::ComponentCreated(component.clone()));
        Ok(component)
    }

    pub async fn get_component(&self, id: &str) -> CoreResult<Component> {
        self.backend
            .fetch_component(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Component", id))
    }

    pub async fn search_components(&self, filter: ComponentFilter) -> CoreResult<Vec<Component>> {
        self.backend.search_components(&filter, COMPONENT_SEARCH_LIMIT).await
    }

    pub async fn update_component(
        &self,
        id: &str,
        patch: ComponentPatch,
    ) -> CoreResult<Component> {
        patch.validate()?;
        let before = self.get_component(id).await?;
        let mut component = before.clone();
        patch.apply(&mut component);
        component.updated_at = self.clock.now();
        self.backend.update_component(&component).await?;
        self.journal_entry(
            ChangeOperation::UpdateComponent,
            EntityKind::Component,
            id,
            Some(EntityState::Component(before)),
            Some(EntityState::Component(component.clone())),
            Metadata::new(),
        )
        .await?;
        self.bus.publish(&GraphEvent::ComponentUpdated(component.clone()));
        Ok(component)
    }

    /// Delete a component and cascade to every incident relationship and
    /// attached comment, in one backend transaction. Cascaded removals are
    /// not journaled individually; only the component delete is.
    pub async fn delete_component(&self, id: &str) -> CoreResult<()> {
        let before = self.get_component(id).await?;
        let report = self.backend.delete_component_cascade(id).await?;
        tracing::debug!(
            component_id = id,
            relationships = report.relationships_removed,
            comments = report.comments_removed,
            "cascade delete"
        );
        self.journal_entry(
            ChangeOperation::DeleteComponent,
            EntityKind::Component,
            id,
            Some(EntityState::Component(before)),
            None,
            Metadata::new(),
        )
        .await?;
        self.bus.publish(&GraphEvent::ComponentDeleted { id: id.to_string() });
        Ok(())
    }

    pub async fn create_components_bulk(
        &self,
        inputs: Vec<NewComponent>,
    ) -> CoreResult<Vec<Component>> {
        for input in &inputs {
            input.validate()?;
        }
        let now = self.clock.now();
        let components: Vec<Component> = inputs
            .into_iter()
            .map(|input| build_component(input, now))
            .collect::<CoreResult<_>>()?;

        self.backend.insert_components_bulk(&components).await?;

        let bulk_metadata = ChangeEvent::bulk_metadata(components.len());
        for component in &components {
            self.journal_entry(
                ChangeOperation::CreateComponentsBulk,
                EntityKind::Component,
                &component.id,
                None,
                Some(EntityState::Component(component.clone())),
                bulk_metadata.clone(),
            )
            .await?;
        }
        self.bus.publish(&GraphEvent::ComponentsBulkCreated {
            count: components.len(),
            items: components.clone(),
        });
        Ok(components)
    }

    // --- relationships ----------------------------------------------------

    pub async fn create_relationship(&self, input: NewRelationship) -> CoreResult<Relationship> {
        input.validate()?;
        let relationship = Relationship {
            id: input.id.unwrap_or_else(mint_id),
            rel_type: input.rel_type,
            source_id: input.source_id,
            target_id: input.target_id,
            details: input.details,
            temporal: input.temporal.filter(|t| !t.is_empty()),
        };
        self.backend.insert_relationship(&relationship).await?;
        self.journal_entry(
            ChangeOperation::CreateRelationship,
            EntityKind::Relationship,
            &relationship.id,
            None,
            Some(EntityState::Relationship(relationship.clone())),
            Metadata::new(),
        )
        .await?;
        self.bus.publish(&GraphEvent::RelationshipCreated(relationship.clone()));
        Ok(relationship)
    }

    pub async fn create_relationships_bulk(
        &self,
        inputs: Vec<NewRelationship>,
    ) -> CoreResult<Vec<Relationship>> {
        for input in &inputs {
            input.validate()?;
        }
        let relationships: Vec<Relationship> = inputs
            .into_iter()
            .map(|input| Relationship {
                id: input.id.unwrap_or_else(mint_id),
                rel_type: input.rel_type,
                source_id: input.source_id,
                target_id: input.target_id,
                details: input.details,
                temporal: input.temporal.filter(|t| !t.is_empty()),
            })
            .collect();

        self.backend.insert_relationships_bulk(&relationships).await?;

        let bulk_metadata = ChangeEvent::bulk_metadata(relationships.len());
        for relationship in &relationships {
            self.journal_entry(
                ChangeOperation::CreateRelationshipsBulk,
                EntityKind::Relationship,
                &relationship.id,
                None,
                Some(EntityState::Relationship(relationship.clone())),
                bulk_metadata.clone(),
            )
            .await?;
        }
        self.bus.publish(&GraphEvent::RelationshipsBulkCreated {
            count: relationships.len(),
            items: relationships.clone(),
        });
        Ok(relationships)
    }

    /// Explicitly delete a relationship. Internal edges are invisible here:
    /// asking for one reports NOT_FOUND.
    pub async fn delete_relationship(&self, id: &str) -> CoreResult<()> {
        let before = self
            .backend
            .fetch_relationship(id)
            .await?
            .filter(|r| !r.rel_type.is_internal())
            .ok_or_else(|| CoreError::not_found("Relationship", id))?;
        self.backend.delete_relationship(id).await?;
        self.journal_entry(
            ChangeOperation::DeleteRelationship,
            EntityKind::Relationship,
            id,
            Some(EntityState::Relationship(before)),
            None,
            Metadata::new(),
        )
        .await?;
        Ok(())
    }

    /// User-visible relationships incident to a component. HAS_COMMENT and
    /// RELATES_TO edges never appear here.
    pub async fn get_component_relationships(
        &self,
        component_id: &str,
        direction: Direction,
    ) -> CoreResult<Vec<ComponentRelation>> {
        self.get_component(component_id).await?;
        self.backend.component_relations(component_id, direction).await
    }

    /// DEPENDS_ON paths from a root, as lists of component ids starting at
    /// the root. Expansion is bounded by `max_depth` (default 3), which also
    /// caps traversal of cyclic graphs.
    pub async fn get_dependency_tree(
        &self,
        root_id: &str,
        max_depth: Option<u32>,
    ) -> CoreResult<Vec<Vec<String>>> {
        self.get_component(root_id).await?;
        let max_depth = max_depth.unwrap_or(DEFAULT_DEPENDENCY_DEPTH).max(1);

        let mut finished: Vec<Vec<String>> = Vec::new();
        let mut active: Vec<Vec<String>> = vec![vec![root_id.to_string()]];

        for _ in 0..max_depth {
            if active.is_empty() {
                break;
            }
            let mut frontier: Vec<String> =
                active.iter().filter_map(|path| path.last().cloned()).collect();
            frontier.sort();
            frontier.dedup();

            let edges = self.backend.depends_on_edges_from(&frontier).await?;
            let mut by_source: HashMap<&str, Vec<&str>> = HashMap::new();
            for (source, target) in &edges {
                by_source.entry(source.as_str()).or_default().push(target.as_str());
            }

            let mut next_active = Vec::new();
            for path in active {
                let Some(tip) = path.last().map(String::as_str) else { continue };
                match by_source.get(tip) {
                    Some(targets) => {
                        for target in targets {
                            let mut extended = path.clone();
                            extended.push((*target).to_string());
                            next_active.push(extended);
                        }
                    }
                    None => finished.push(path),
                }
            }
            active = next_active;
        }

        finished.extend(active);
        // The bare root is not a dependency path.
        finished.retain(|path| path.len() > 1);
        Ok(finished)
    }

    // --- tasks ------------------------------------------------------------

    pub async fn create_task(&self, input: NewTask) -> CoreResult<Task> {
        input.validate()?;
        let now = self.clock.now();
        let task = Task {
            id: input.id.unwrap_or_else(mint_id),
            name: input.name,
            description: input.description,
            status: input.status.unwrap_or_default(),
            progress: input.progress.unwrap_or(0.0),
            codebase: input.codebase,
            related_component_ids: input.related_component_ids,
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
        };
        self.backend.insert_task(&task).await?;
        self.journal_entry(
            ChangeOperation::CreateTask,
            EntityKind::Task,
            &task.id,
            None,
            Some(EntityState::Task(task.clone())),
            Metadata::new(),
        )
        .await?;
        self.bus.publish(&GraphEvent::TaskCreated(task.clone()));
        Ok(task)
    }

    pub async fn get_task(&self, id: &str) -> CoreResult<Task> {
        self.backend
            .fetch_task(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Task", id))
    }

    pub async fn get_tasks(&self, status: Option<TaskStatus>) -> CoreResult<Vec<Task>> {
        self.backend.list_tasks(status).await
    }

    pub async fn update_task_status(
        &self,
        id: &str,
        status: TaskStatus,
        progress: Option<f64>,
    ) -> CoreResult<Task> {
        if let Some(progress) = progress {
            validate_progress(progress)?;
        }
        let before = self.get_task(id).await?;
        let mut task = before.clone();
        task.status = status;
        if let Some(progress) = progress {
            task.progress = progress;
        }
        task.updated_at = self.clock.now();
        self.backend.update_task(&task).await?;
        self.journal_entry(
            ChangeOperation::UpdateTask,
            EntityKind::Task,
            id,
            Some(EntityState::Task(before)),
            Some(EntityState::Task(task.clone())),
            Metadata::new(),
        )
        .await?;
        self.bus.publish(&GraphEvent::TaskUpdated(task.clone()));
        Ok(task)
    }

    pub async fn search_tasks(&self, search: TaskSearch) -> CoreResult<Vec<Task>> {
        search.validate()?;
        self.backend.search_tasks(&search).await
    }

    pub async fn create_tasks_bulk(&self, inputs: Vec<NewTask>) -> CoreResult<Vec<Task>> {
        for input in &inputs {
            input.validate()?;
        }
        let now = self.clock.now();
        let tasks: Vec<Task> = inputs
            .into_iter()
            .map(|input| Task {
                id: input.id.unwrap_or_else(mint_id),
                name: input.name,
                description: input.description,
                status: input.status.unwrap_or_default(),
                progress: input.progress.unwrap_or(0.0),
                codebase: input.codebase,
                related_component_ids: input.related_component_ids,
                metadata: input.metadata,
                created_at: now,
                updated_at: now,
            })
            .collect();

        self.backend.insert_tasks_bulk(&tasks).await?;

        let bulk_metadata = ChangeEvent::bulk_metadata(tasks.len());
        for task in &tasks {
            self.journal_entry(
                ChangeOperation::CreateTasksBulk,
                EntityKind::Task,
                &task.id,
                None,
                Some(EntityState::Task(task.clone())),
                bulk_metadata.clone(),
            )
            .await?;
        }
        self.bus
            .publish(&GraphEvent::TasksBulkCreated { count: tasks.len(), items: tasks.clone() });
        Ok(tasks)
    }

    // --- comments ---------------------------------------------------------

    pub async fn create_comment(&self, input: NewComment) -> CoreResult<Comment> {
        input.validate()?;
        let comment = Comment {
            id: input.id.unwrap_or_else(mint_id),
            parent_id: input.parent_id,
            content: input.content,
            author: input.author,
            metadata: input.metadata,
            created_at: self.clock.now(),
            updated_at: None,
        };
        self.backend.insert_comment(&comment).await?;
        self.journal_entry(
            ChangeOperation::CreateComment,
            EntityKind::Comment,
            &comment.id,
            None,
            Some(EntityState::Comment(comment.clone())),
            Metadata::new(),
        )
        .await?;
        Ok(comment)
    }

    pub async fn get_comment(&self, id: &str) -> CoreResult<Comment> {
        self.backend
            .fetch_comment(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Comment", id))
    }

    /// Comments on a node, newest first.
    pub async fn get_node_comments(
        &self,
        node_id: &str,
        limit: Option<u32>,
    ) -> CoreResult<Vec<Comment>> {
        self.backend
            .comments_for(node_id, limit.unwrap_or(DEFAULT_COMMENT_LIMIT))
            .await
    }

    pub async fn update_comment(&self, id: &str, content: String) -> CoreResult<Comment> {
        if content.trim().is_empty() {
            return Err(CoreError::validation("comment content cannot be empty"));
        }
        let before = self.get_comment(id).await?;
        let mut comment = before.clone();
        comment.content = content;
        comment.updated_at = Some(self.clock.now());
        self.backend.update_comment(&comment).await?;
        self.journal_entry(
            ChangeOperation::UpdateComment,
            EntityKind::Comment,
            id,
            Some(EntityState::Comment(before)),
            Some(EntityState::Comment(comment.clone())),
            Metadata::new(),
        )
        .await?;
        Ok(comment)
    }

    pub async fn delete_comment(&self, id: &str) -> CoreResult<()> {
        let before = self.get_comment(id).await?;
        self.backend.delete_comment(id).await?;
        self.journal_entry(
            ChangeOperation::DeleteComment,
            EntityKind::Comment,
            id,
            Some(EntityState::Comment(before)),
            None,
            Metadata::new(),
        )
        .await?;
        Ok(())
    }

    // --- analysis ---------------------------------------------------------

    pub async fn get_codebase_overview(&self, codebase: &str) -> CoreResult<CodebaseOverview> {
        let kinds = self.backend.codebase_kind_counts(codebase).await?;
        let total_components = kinds.iter().map(|row| row.count).sum();
        let relationship_count = self.backend.codebase_relationship_count(codebase).await?;
        Ok(CodebaseOverview {
            codebase: codebase.to_string(),
            kinds,
            total_components,
            relationship_count,
        })
    }

    // --- internals --------------------------------------------------------

    async fn journal_entry(
        &self,
        operation: ChangeOperation,
        entity_kind: EntityKind,
        entity_id: &str,
        before_state: Option<EntityState>,
        after_state: Option<EntityState>,
        metadata: Metadata,
    ) -> CoreResult<()> {
        let event = ChangeEvent {
            id: mint_id(),
            operation,
            entity_kind,
            entity_id: entity_id.to_string(),
            before_state,
            after_state,
            timestamp: self.clock.now(),
            session_id: self.provenance.session_id.clone(),
            user_id: self.provenance.user_id.clone(),
            source: self.provenance.source.clone(),
            metadata,
        };
        self.journal.append(&event).await
    }
}

fn build_component(
    input: NewComponent,
    now: chrono::DateTime<chrono::Utc>,
) -> CoreResult<Component> {
    let kind = input
        .kind
        .ok_or_else(|| CoreError::validation("component kind is required"))?;
    Ok(Component {
        id: input.id.unwrap_or_else(mint_id),
        kind,
        name: input.name,
        description: input.description,
        path: input.path,
        codebase: input.codebase,
        metadata: input.metadata,
        created_at: now,
        updated_at: now,
    })
}
