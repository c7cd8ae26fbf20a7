//! Public API facade.
//!
//! The single entry point external transports (MCP, HTTP/SSE, CLI) talk to.
//! It wires the store, journal, snapshot engine, broker, and event bus over
//! one SQLite pool, and exposes the boundary operations as thin dispatch:
//! validation and business rules live in the services underneath, and errors
//! surface as [`CoreError`] whose kinds are the stable boundary codes.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::adapters::sqlite::{
    create_pool, run_migrations, SqliteGraphBackend, SqliteJournalRepository,
    SqliteSnapshotRepository,
};
use crate::domain::clock::Clock;
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    BrokerHistoryEntry, ChangeEvent, ChangeOperation, Comment, CommandInput, Component,
    ComponentFilter, ComponentPatch, ComponentRelation, Direction, JournalStats, NewComment,
    NewComponent, NewRelationship, NewTask, PendingCommand, Provenance, Relationship, SendOutcome,
    Snapshot, SnapshotMeta, Task, TaskSearch, TaskStatus, WaitingAgentInfo,
};
use crate::services::change_journal::{ChangeHistoryQuery, ChangeJournal};
use crate::services::command_broker::{CommandBroker, WaitOptions};
use crate::services::config::CoreConfig;
use crate::services::event_bus::{EventBus, EventKind, Subscription};
use crate::services::graph_store::{CodebaseOverview, GraphStore};
use crate::services::snapshot_engine::{ReplayReport, RestoreReport, SnapshotEngine};

/// Uniform request entry point for external transports.
pub struct CodegraphApi {
    store: GraphStore,
    journal: ChangeJournal,
    snapshots: SnapshotEngine,
    broker: Arc<CommandBroker>,
    bus: Arc<EventBus>,
    pool: SqlitePool,
}

impl CodegraphApi {
    /// Connect to the configured database, run migrations, and assemble the
    /// core services.
    pub async fn connect(config: &CoreConfig) -> CoreResult<Self> {
        let pool = create_pool(&config.database.url, config.database.max_connections)
            .await
            .map_err(|e| CoreError::Backend(e.to_string()))?;

        run_migrations(&pool)
            .await
            .map_err(|e| CoreError::Backend(e.to_string()))?;

        Ok(Self::with_pool(pool, config))
    }

    /// Assemble the core over an existing (already migrated) pool. Tests use
    /// this with an in-memory database.
    pub fn with_pool(pool: SqlitePool, config: &CoreConfig) -> Self {
        let bus = Arc::new(EventBus::new(config.events.mailbox_capacity));
        let clock = Arc::new(Clock::new());
        let backend = Arc::new(SqliteGraphBackend::new(pool.clone()));
        let journal_repo = Arc::new(SqliteJournalRepository::new(pool.clone()));
        let snapshot_repo = Arc::new(SqliteSnapshotRepository::new(pool.clone()));

        let store = GraphStore::new(
            backend.clone(),
            journal_repo.clone(),
            bus.clone(),
            clock.clone(),
        );
        let journal = ChangeJournal::new(journal_repo.clone());
        let snapshots =
            SnapshotEngine::new(backend, snapshot_repo, journal_repo, clock);
        let broker = Arc::new(CommandBroker::new(config.broker).with_bus(bus.clone()));

        Self { store, journal, snapshots, broker, bus, pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The graph store, stamping journal entries with default provenance.
    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// A store view journaling under the given session/user/source.
    pub fn session_store(&self, provenance: Provenance) -> GraphStore {
        self.store.with_session(provenance)
    }

    pub fn broker(&self) -> &CommandBroker {
        &self.broker
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Subscribe a transport to every core event.
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe()
    }

    /// Subscribe a transport to selected event kinds.
    pub fn subscribe_to(&self, kinds: &[EventKind]) -> Subscription {
        self.bus.subscribe_to(kinds)
    }

    // --- components -------------------------------------------------------

    pub async fn create_component(&self, input: NewComponent) -> CoreResult<Component> {
        self.store.create_component(input).await
    }

    pub async fn get_component(&self, id: &str) -> CoreResult<Component> {
        self.store.get_component(id).await
    }

    pub async fn search_components(&self, filter: ComponentFilter) -> CoreResult<Vec<Component>> {
        self.store.search_components(filter).await
    }

    pub async fn update_component(
        &self,
        id: &str,
        patch: ComponentPatch,
    ) -> CoreResult<Component> {
        self.store.update_component(id, patch).await
    }

    pub async fn delete_component(&self, id: &str) -> CoreResult<()> {
        self.store.delete_component(id).await
    }

    pub async fn create_components_bulk(
        &self,
        inputs: Vec<NewComponent>,
    ) -> CoreResult<Vec<Component>> {
        self.store.create_components_bulk(inputs).await
    }

    // --- relationships ----------------------------------------------------

    pub async fn create_relationship(&self, input: NewRelationship) -> CoreResult<Relationship> {
        self.store.create_relationship(input).await
    }

    pub async fn create_relationships_bulk(
        &self,
        inputs: Vec<NewRelationship>,
    ) -> CoreResult<Vec<Relationship>> {
        self.store.create_relationships_bulk(inputs).await
    }

    pub async fn delete_relationship(&self, id: &str) -> CoreResult<()> {
        self.store.delete_relationship(id).await
    }

    pub async fn get_component_relationships(
        &self,
        component_id: &str,
        direction: Direction,
    ) -> CoreResult<Vec<ComponentRelation>> {
        self.store.get_component_relationships(component_id, direction).await
    }

    pub async fn get_dependency_tree(
        &self,
        root_id: &str,
        max_depth: Option<u32>,
    ) -> CoreResult<Vec<Vec<String>>> {
        self.store.get_dependency_tree(root_id, max_depth).await
    }

    // --- tasks --------------------------------------------------------------

    pub async fn create_task(&self, input: NewTask) -> CoreResult<Task> {
        self.store.create_task(input).await
    }

    pub async fn get_task(&self, id: &str) -> CoreResult<Task> {
        self.store.get_task(id).await
    }

    pub async fn get_tasks(&self, status: Option<TaskStatus>) -> CoreResult<Vec<Task>> {
        self.store.get_tasks(status).await
    }

    pub async fn search_tasks(&self, search: TaskSearch) -> CoreResult<Vec<Task>> {
        self.store.search_tasks(search).await
    }

    pub async fn update_task_status(
        &self,
        id: &str,
        status: TaskStatus,
        progress: Option<f64>,
    ) -> CoreResult<Task> {
        self.store.update_task_status(id, status, progress).await
    }

    pub async fn create_tasks_bulk(&self, inputs: Vec<NewTask>) -> CoreResult<Vec<Task>> {
        self.store.create_tasks_bulk(inputs).await
    }

    // --- comments -----------------------------------------------------------

    pub async fn create_comment(&self, input: NewComment) -> CoreResult<Comment> {
        self.store.create_comment(input).await
    }

    pub async fn get_comment(&self, id: &str) -> CoreResult<Comment> {
        self.store.get_comment(id).await
    }

    pub async fn get_node_comments(
        &self,
        node_id: &str,
        limit: Option<u32>,
    ) -> CoreResult<Vec<Comment>> {
        self.store.get_node_comments(node_id, limit).await
    }

    pub async fn update_comment(&self, id: &str, content: String) -> CoreResult<Comment> {
        self.store.update_comment(id, content).await
    }

    pub async fn delete_comment(&self, id: &str) -> CoreResult<()> {
        self.store.delete_comment(id).await
    }

    // --- analysis -----------------------------------------------------------

    pub async fn get_codebase_overview(&self, codebase: &str) -> CoreResult<CodebaseOverview> {
        self.store.get_codebase_overview(codebase).await
    }

    // --- journal & snapshots -------------------------------------------------

    pub async fn get_change_history(
        &self,
        query: ChangeHistoryQuery,
    ) -> CoreResult<Vec<ChangeEvent>> {
        self.journal.get_change_history(query).await
    }

    pub async fn get_changes_by_time_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: Option<u32>,
    ) -> CoreResult<Vec<ChangeEvent>> {
        self.journal.get_changes_by_time_range(from, to, limit).await
    }

    pub async fn get_session_changes(&self, session_id: &str) -> CoreResult<Vec<ChangeEvent>> {
        self.journal.get_session_changes(session_id).await
    }

    pub async fn get_history_stats(&self) -> CoreResult<JournalStats> {
        self.journal.get_stats().await
    }

    pub async fn create_snapshot(
        &self,
        name: &str,
        description: Option<String>,
    ) -> CoreResult<Snapshot> {
        self.snapshots.create_snapshot(name, description).await
    }

    pub async fn list_snapshots(&self) -> CoreResult<Vec<SnapshotMeta>> {
        self.snapshots.list_snapshots().await
    }

    pub async fn restore_snapshot(
        &self,
        snapshot_id: &str,
        dry_run: bool,
    ) -> CoreResult<RestoreReport> {
        self.snapshots.restore_from_snapshot(snapshot_id, dry_run).await
    }

    pub async fn replay_to_timestamp(
        &self,
        target: DateTime<Utc>,
        dry_run: bool,
    ) -> CoreResult<ReplayReport> {
        self.snapshots.replay_to_timestamp(target, dry_run).await
    }

    // --- broker ---------------------------------------------------------------

    pub async fn wait_for_command(
        &self,
        agent_id: &str,
        options: WaitOptions,
    ) -> CoreResult<PendingCommand> {
        self.broker.wait_for_command(agent_id, options).await
    }

    pub async fn send_command(&self, input: CommandInput) -> CoreResult<SendOutcome> {
        self.broker.send_command(input).await
    }

    pub fn get_waiting_agents(&self) -> Vec<WaitingAgentInfo> {
        self.broker.get_waiting_agents()
    }

    pub fn get_pending_commands(&self) -> Vec<PendingCommand> {
        self.broker.get_pending_commands()
    }

    pub fn cancel_command(&self, id: &str) -> bool {
        self.broker.cancel_command(id)
    }

    pub fn cancel_wait(&self, agent_id: &str) -> bool {
        self.broker.cancel_wait(agent_id)
    }

    pub fn get_command_history(&self, limit: Option<usize>) -> Vec<BrokerHistoryEntry> {
        self.broker.get_history(limit)
    }
}

/// Convenience: build a history query for one entity.
pub fn entity_history(entity_id: impl Into<String>) -> ChangeHistoryQuery {
    ChangeHistoryQuery { entity_id: Some(entity_id.into()), ..ChangeHistoryQuery::default() }
}

/// Convenience: build a global history query filtered by operation.
pub fn operation_history(operation: ChangeOperation) -> ChangeHistoryQuery {
    ChangeHistoryQuery { operation: Some(operation), ..ChangeHistoryQuery::default() }
}
