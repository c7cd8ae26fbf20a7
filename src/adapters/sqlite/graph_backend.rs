//! SQLite implementation of the graph backend port.
//!
//! Nodes live in the `components`, `tasks`, and `comments` tables; every edge
//! (user-visible relationships plus the internal HAS_COMMENT and RELATES_TO
//! links) lives in `edges`. Multi-row mutations run inside one transaction so
//! cascades, bulk inserts, and restores are all-or-nothing.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;

use crate::domain::clock::mint_id;
use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    Comment, Component, ComponentFilter, ComponentKind, ComponentRelation, Direction, GraphDump,
    Relationship, RelationshipType, RestoreCounts, Task, TaskSearch, TaskStatus, TemporalHint,
};
use crate::domain::ports::{CascadeReport, GraphBackend, KindCount};

use super::{fmt_ts, parse_opt_ts, parse_ts};

/// SQL fragment excluding the internal edge kinds from relationship queries.
const USER_VISIBLE: &str = "edge_type NOT IN ('HAS_COMMENT', 'RELATES_TO')";

/// Typed placeholder value for dynamically assembled queries.
enum Bind {
    Text(String),
    Real(f64),
}

#[derive(Clone)]
pub struct SqliteGraphBackend {
    pool: SqlitePool,
}

impl SqliteGraphBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GraphBackend for SqliteGraphBackend {
    async fn insert_component(&self, component: &Component) -> CoreResult<()> {
        let mut conn = self.pool.acquire().await.map_err(CoreError::from)?;
        exec_insert_component(&mut *conn, component)
            .await
            .map_err(|e| match e {
                CoreError::Conflict(_) => {
                    CoreError::Conflict(format!("Component already exists: {}", component.id))
                }
                other => other,
            })
    }

    async fn fetch_component(&self, id: &str) -> CoreResult<Option<Component>> {
        let row: Option<ComponentRow> = sqlx::query_as("SELECT * FROM components WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_component(&self, component: &Component) -> CoreResult<()> {
        let metadata_json = serde_json::to_string(&component.metadata)?;
        let result = sqlx::query(
            r#"UPDATE components SET kind = ?, name = ?, description = ?, path = ?,
               codebase = ?, metadata = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(component.kind.as_str())
        .bind(&component.name)
        .bind(&component.description)
        .bind(&component.path)
        .bind(&component.codebase)
        .bind(&metadata_json)
        .bind(fmt_ts(component.updated_at))
        .bind(&component.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Component", &component.id));
        }
        Ok(())
    }

    async fn delete_component_cascade(&self, id: &str) -> CoreResult<CascadeReport> {
        let mut tx = self.pool.begin().await.map_err(CoreError::from)?;

        let (relationships_removed,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM edges WHERE (source_id = ?1 OR target_id = ?1) AND {USER_VISIBLE}"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let comments = sqlx::query(
            r#"DELETE FROM comments WHERE id IN
               (SELECT target_id FROM edges WHERE source_id = ? AND edge_type = 'HAS_COMMENT')"#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM edges WHERE source_id = ?1 OR target_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM components WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(CoreError::not_found("Component", id));
        }

        tx.commit().await.map_err(CoreError::from)?;
        Ok(CascadeReport {
            relationships_removed: relationships_removed as u64,
            comments_removed: comments.rows_affected(),
        })
    }

    async fn search_components(
        &self,
        filter: &ComponentFilter,
        limit: u32,
    ) -> CoreResult<Vec<Component>> {
        let mut query = String::from("SELECT * FROM components WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(kind) = filter.kind {
            query.push_str(" AND kind = ?");
            bindings.push(kind.as_str().to_string());
        }
        if let Some(name) = &filter.name {
            query.push_str(" AND name LIKE ?");
            bindings.push(format!("%{name}%"));
        }
        if let Some(codebase) = &filter.codebase {
            query.push_str(" AND codebase = ?");
            bindings.push(codebase.clone());
        }
        query.push_str(" ORDER BY created_at, id LIMIT ?");

        let mut q = sqlx::query_as::<_, ComponentRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }
        q = q.bind(i64::from(limit));

        let rows: Vec<ComponentRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_relationship(&self, relationship: &Relationship) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(CoreError::from)?;
        require_component(&mut *tx, &relationship.source_id).await?;
        require_component(&mut *tx, &relationship.target_id).await?;
        exec_insert_edge(&mut *tx, relationship)
            .await
            .map_err(|e| Self::conflict_from(e, relationship))?;
        tx.commit().await.map_err(CoreError::from)?;
        Ok(())
    }

    async fn fetch_relationship(&self, id: &str) -> CoreResult<Option<Relationship>> {
        let row: Option<EdgeRow> = sqlx::query_as("SELECT * FROM edges WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn delete_relationship(&self, id: &str) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM edges WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Relationship", id));
        }
        Ok(())
    }

    async fn find_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        rel_type: RelationshipType,
    ) -> CoreResult<Option<Relationship>> {
        let row: Option<EdgeRow> = sqlx::query_as(
            r#"SELECT * FROM edges WHERE source_id = ? AND target_id = ? AND edge_type = ?
               ORDER BY created_at LIMIT 1"#,
        )
        .bind(source_id)
        .bind(target_id)
        .bind(rel_type.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn component_relations(
        &self,
        component_id: &str,
        direction: Direction,
    ) -> CoreResult<Vec<ComponentRelation>> {
        let mut relations = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            self.collect_relations(component_id, Direction::Outgoing, &mut relations)
                .await?;
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            self.collect_relations(component_id, Direction::Incoming, &mut relations)
                .await?;
        }
        Ok(relations)
    }

    async fn depends_on_edges_from(
        &self,
        source_ids: &[String],
    ) -> CoreResult<Vec<(String, String)>> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; source_ids.len()].join(", ");
        let query = format!(
            "SELECT source_id, target_id FROM edges
             WHERE edge_type = 'DEPENDS_ON' AND source_id IN ({placeholders})
             ORDER BY created_at"
        );
        let mut q = sqlx::query_as::<_, (String, String)>(&query);
        for id in source_ids {
            q = q.bind(id);
        }
        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn insert_task(&self, task: &Task) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(CoreError::from)?;
        exec_insert_task(&mut *tx, task).await.map_err(|e| match e {
            CoreError::Conflict(_) => CoreError::Conflict(format!("Task already exists: {}", task.id)),
            other => other,
        })?;
        for component_id in &task.related_component_ids {
            require_component(&mut *tx, component_id).await?;
            exec_insert_link(&mut *tx, RelationshipType::RelatesTo, &task.id, component_id).await?;
        }
        tx.commit().await.map_err(CoreError::from)?;
        Ok(())
    }

    async fn fetch_task(&self, id: &str) -> CoreResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let mut task: Task = row.try_into()?;
                self.load_task_relations(std::slice::from_mut(&mut task)).await?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    async fn update_task(&self, task: &Task) -> CoreResult<()> {
        let metadata_json = serde_json::to_string(&task.metadata)?;
        let result = sqlx::query(
            r#"UPDATE tasks SET name = ?, description = ?, status = ?, progress = ?,
               codebase = ?, metadata = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.progress)
        .bind(&task.codebase)
        .bind(&metadata_json)
        .bind(fmt_ts(task.updated_at))
        .bind(&task.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Task", &task.id));
        }
        Ok(())
    }

    async fn list_tasks(&self, status: Option<TaskStatus>) -> CoreResult<Vec<Task>> {
        let rows: Vec<TaskRow> = match status {
            Some(status) => {
                sqlx::query_as("SELECT * FROM tasks WHERE status = ? ORDER BY created_at DESC")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM tasks ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        let mut tasks: Vec<Task> = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<CoreResult<_>>()?;
        self.load_task_relations(&mut tasks).await?;
        Ok(tasks)
    }

    async fn search_tasks(&self, search: &TaskSearch) -> CoreResult<Vec<Task>> {
        let mut query = String::from("SELECT * FROM tasks WHERE 1=1");
        let mut bindings: Vec<Bind> = Vec::new();

        if let Some(text) = &search.text_query {
            query.push_str(" AND (name LIKE ? OR description LIKE ?)");
            let pattern = format!("%{text}%");
            bindings.push(Bind::Text(pattern.clone()));
            bindings.push(Bind::Text(pattern));
        }
        if !search.statuses.is_empty() {
            let placeholders = vec!["?"; search.statuses.len()].join(", ");
            query.push_str(&format!(" AND status IN ({placeholders})"));
            for status in &search.statuses {
                bindings.push(Bind::Text(status.as_str().to_string()));
            }
        }
        if let Some(min) = search.progress_min {
            query.push_str(" AND progress >= ?");
            bindings.push(Bind::Real(min));
        }
        if let Some(max) = search.progress_max {
            query.push_str(" AND progress <= ?");
            bindings.push(Bind::Real(max));
        }
        if let Some(after) = search.created_after {
            query.push_str(" AND created_at >= ?");
            bindings.push(Bind::Text(fmt_ts(after)));
        }
        if let Some(before) = search.created_before {
            query.push_str(" AND created_at <= ?");
            bindings.push(Bind::Text(fmt_ts(before)));
        }
        if !search.related_component_ids.is_empty() {
            let placeholders = vec!["?"; search.related_component_ids.len()].join(", ");
            query.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM edges e WHERE e.edge_type = 'RELATES_TO'
                   AND e.source_id = tasks.id AND e.target_id IN ({placeholders}))"
            ));
            for id in &search.related_component_ids {
                bindings.push(Bind::Text(id.clone()));
            }
        }

        let column = match search.order_by {
            crate::domain::models::TaskOrder::Created => "created_at",
            crate::domain::models::TaskOrder::Name => "name",
            crate::domain::models::TaskOrder::Status => "status",
            crate::domain::models::TaskOrder::Progress => "progress",
        };
        let dir = match search.order_direction {
            crate::domain::models::OrderDirection::Asc => "ASC",
            crate::domain::models::OrderDirection::Desc => "DESC",
        };
        query.push_str(&format!(" ORDER BY {column} {dir}, id LIMIT ?"));

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        for binding in &bindings {
            q = match binding {
                Bind::Text(value) => q.bind(value),
                Bind::Real(value) => q.bind(*value),
            };
        }
        q = q.bind(i64::from(search.effective_limit()));

        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        let mut tasks: Vec<Task> = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<CoreResult<_>>()?;
        self.load_task_relations(&mut tasks).await?;
        Ok(tasks)
    }

    async fn insert_comment(&self, comment: &Comment) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(CoreError::from)?;
        require_node(&mut *tx, &comment.parent_id).await?;
        exec_insert_comment(&mut *tx, comment).await.map_err(|e| match e {
            CoreError::Conflict(_) => {
                CoreError::Conflict(format!("Comment already exists: {}", comment.id))
            }
            other => other,
        })?;
        exec_insert_link(&mut *tx, RelationshipType::HasComment, &comment.parent_id, &comment.id)
            .await?;
        tx.commit().await.map_err(CoreError::from)?;
        Ok(())
    }

    async fn fetch_comment(&self, id: &str) -> CoreResult<Option<Comment>> {
        let row: Option<CommentRow> = sqlx::query_as("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_comment(&self, comment: &Comment) -> CoreResult<()> {
        let metadata_json = serde_json::to_string(&comment.metadata)?;
        let result = sqlx::query(
            "UPDATE comments SET content = ?, author = ?, metadata = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&comment.content)
        .bind(&comment.author)
        .bind(&metadata_json)
        .bind(comment.updated_at.map(fmt_ts))
        .bind(&comment.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Comment", &comment.id));
        }
        Ok(())
    }

    async fn delete_comment(&self, id: &str) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(CoreError::from)?;
        sqlx::query("DELETE FROM edges WHERE target_id = ? AND edge_type = 'HAS_COMMENT'")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Comment", id));
        }
        tx.commit().await.map_err(CoreError::from)?;
        Ok(())
    }

    async fn comments_for(&self, node_id: &str, limit: u32) -> CoreResult<Vec<Comment>> {
        let rows: Vec<CommentRow> = sqlx::query_as(
            "SELECT * FROM comments WHERE parent_id = ? ORDER BY created_at DESC, id LIMIT ?",
        )
        .bind(node_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_components_bulk(&self, components: &[Component]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(CoreError::from)?;
        for component in components {
            exec_insert_component(&mut *tx, component)
                .await
                .map_err(|e| match e {
                    CoreError::Conflict(_) => {
                        CoreError::Conflict(format!("Component already exists: {}", component.id))
                    }
                    other => other,
                })?;
        }
        tx.commit().await.map_err(CoreError::from)?;
        Ok(())
    }

    async fn insert_relationships_bulk(&self, relationships: &[Relationship]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(CoreError::from)?;
        for relationship in relationships {
            require_component(&mut *tx, &relationship.source_id).await?;
            require_component(&mut *tx, &relationship.target_id).await?;
            exec_insert_edge(&mut *tx, relationship)
                .await
                .map_err(|e| Self::conflict_from(e, relationship))?;
        }
        tx.commit().await.map_err(CoreError::from)?;
        Ok(())
    }

    async fn insert_tasks_bulk(&self, tasks: &[Task]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(CoreError::from)?;
        for task in tasks {
            exec_insert_task(&mut *tx, task).await.map_err(|e| match e {
                CoreError::Conflict(_) => {
                    CoreError::Conflict(format!("Task already exists: {}", task.id))
                }
                other => other,
            })?;
            for component_id in &task.related_component_ids {
                require_component(&mut *tx, component_id).await?;
                exec_insert_link(&mut *tx, RelationshipType::RelatesTo, &task.id, component_id)
                    .await?;
            }
        }
        tx.commit().await.map_err(CoreError::from)?;
        Ok(())
    }

    async fn codebase_kind_counts(&self, codebase: &str) -> CoreResult<Vec<KindCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT kind, COUNT(*) FROM components WHERE codebase = ?
             GROUP BY kind ORDER BY COUNT(*) DESC, kind",
        )
        .bind(codebase)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(kind, count)| KindCount { kind, count: count as u64 })
            .collect())
    }

    async fn codebase_relationship_count(&self, codebase: &str) -> CoreResult<u64> {
        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM edges e
             JOIN components s ON s.id = e.source_id
             WHERE e.{USER_VISIBLE} AND s.codebase = ?"
        ))
        .bind(codebase)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn dump_graph(&self) -> CoreResult<GraphDump> {
        // One transaction so the capture is a consistent cut of the graph.
        let mut tx = self.pool.begin().await.map_err(CoreError::from)?;

        let component_rows: Vec<ComponentRow> =
            sqlx::query_as("SELECT * FROM components ORDER BY created_at, id")
                .fetch_all(&mut *tx)
                .await?;
        let components = component_rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<CoreResult<Vec<_>>>()?;

        let task_rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM tasks ORDER BY created_at, id")
            .fetch_all(&mut *tx)
            .await?;
        let mut tasks: Vec<Task> = task_rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<CoreResult<_>>()?;

        let links: Vec<(String, String)> = sqlx::query_as(
            "SELECT source_id, target_id FROM edges WHERE edge_type = 'RELATES_TO'
             ORDER BY created_at",
        )
        .fetch_all(&mut *tx)
        .await?;
        let mut by_task: HashMap<String, Vec<String>> = HashMap::new();
        for (task_id, component_id) in links {
            by_task.entry(task_id).or_default().push(component_id);
        }
        for task in &mut tasks {
            task.related_component_ids = by_task.remove(&task.id).unwrap_or_default();
        }

        let comment_rows: Vec<CommentRow> =
            sqlx::query_as("SELECT * FROM comments ORDER BY created_at, id")
                .fetch_all(&mut *tx)
                .await?;
        let comments = comment_rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<CoreResult<Vec<_>>>()?;

        let edge_rows: Vec<EdgeRow> = sqlx::query_as(&format!(
            "SELECT * FROM edges WHERE {USER_VISIBLE} ORDER BY created_at, id"
        ))
        .fetch_all(&mut *tx)
        .await?;
        let relationships = edge_rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<CoreResult<Vec<_>>>()?;

        tx.commit().await.map_err(CoreError::from)?;
        Ok(GraphDump { components, tasks, comments, relationships })
    }

    async fn clear_graph(&self) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(CoreError::from)?;
        exec_clear_graph(&mut *tx).await?;
        tx.commit().await.map_err(CoreError::from)?;
        Ok(())
    }

    async fn restore_graph(&self, dump: &GraphDump) -> CoreResult<RestoreCounts> {
        let mut tx = self.pool.begin().await.map_err(CoreError::from)?;
        exec_clear_graph(&mut *tx).await?;

        for component in &dump.components {
            exec_insert_component(&mut *tx, component).await?;
        }
        for task in &dump.tasks {
            exec_insert_task(&mut *tx, task).await?;
            for component_id in &task.related_component_ids {
                exec_insert_link(&mut *tx, RelationshipType::RelatesTo, &task.id, component_id)
                    .await?;
            }
        }
        for relationship in &dump.relationships {
            exec_insert_edge(&mut *tx, relationship).await?;
        }
        for comment in &dump.comments {
            exec_insert_comment(&mut *tx, comment).await?;
            exec_insert_link(&mut *tx, RelationshipType::HasComment, &comment.parent_id, &comment.id)
                .await?;
        }

        tx.commit().await.map_err(CoreError::from)?;
        Ok(RestoreCounts {
            components: dump.components.len() as u64,
            tasks: dump.tasks.len() as u64,
            relationships: dump.relationships.len() as u64,
            comments: dump.comments.len() as u64,
        })
    }
}

impl SqliteGraphBackend {
    fn conflict_from(err: CoreError, relationship: &Relationship) -> CoreError {
        match err {
            CoreError::Conflict(_) => {
                CoreError::Conflict(format!("Relationship already exists: {}", relationship.id))
            }
            other => other,
        }
    }

    async fn collect_relations(
        &self,
        component_id: &str,
        direction: Direction,
        out: &mut Vec<ComponentRelation>,
    ) -> CoreResult<()> {
        let (anchor, neighbor_col) = match direction {
            Direction::Outgoing => ("source_id", "target_id"),
            Direction::Incoming => ("target_id", "source_id"),
            Direction::Both => unreachable!("collect_relations takes a concrete direction"),
        };
        let edge_rows: Vec<EdgeRow> = sqlx::query_as(&format!(
            "SELECT * FROM edges WHERE {anchor} = ? AND {USER_VISIBLE} ORDER BY created_at, id"
        ))
        .bind(component_id)
        .fetch_all(&self.pool)
        .await?;
        if edge_rows.is_empty() {
            return Ok(());
        }

        let neighbor_ids: Vec<String> = edge_rows
            .iter()
            .map(|row| {
                if neighbor_col == "target_id" { row.target_id.clone() } else { row.source_id.clone() }
            })
            .collect();
        let neighbors = self.fetch_components_by_ids(&neighbor_ids).await?;

        for row in edge_rows {
            let neighbor_id =
                if neighbor_col == "target_id" { &row.target_id } else { &row.source_id };
            if let Some(neighbor) = neighbors.get(neighbor_id.as_str()) {
                out.push(ComponentRelation {
                    relationship: row.try_into()?,
                    neighbor: neighbor.clone(),
                    direction,
                });
            }
        }
        Ok(())
    }

    async fn fetch_components_by_ids(
        &self,
        ids: &[String],
    ) -> CoreResult<HashMap<String, Component>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let query = format!("SELECT * FROM components WHERE id IN ({placeholders})");
        let mut q = sqlx::query_as::<_, ComponentRow>(&query);
        for id in ids {
            q = q.bind(id);
        }
        let rows: Vec<ComponentRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                let component: Component = row.try_into()?;
                Ok((component.id.clone(), component))
            })
            .collect()
    }

    async fn load_task_relations(&self, tasks: &mut [Task]) -> CoreResult<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        let placeholders = vec!["?"; ids.len()].join(", ");
        let query = format!(
            "SELECT source_id, target_id FROM edges
             WHERE edge_type = 'RELATES_TO' AND source_id IN ({placeholders})
             ORDER BY created_at"
        );
        let mut q = sqlx::query_as::<_, (String, String)>(&query);
        for id in &ids {
            q = q.bind(id);
        }
        let links: Vec<(String, String)> = q.fetch_all(&self.pool).await?;

        let mut by_task: HashMap<String, Vec<String>> = HashMap::new();
        for (task_id, component_id) in links {
            by_task.entry(task_id).or_default().push(component_id);
        }
        for task in tasks {
            task.related_component_ids = by_task.remove(&task.id).unwrap_or_default();
        }
        Ok(())
    }
}

// --- transaction-scoped statement helpers ---------------------------------

async fn require_component(conn: &mut SqliteConnection, id: &str) -> CoreResult<()> {
    let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM components WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Err(CoreError::not_found("Component", id));
    }
    Ok(())
}

/// Comment parents may be components or tasks.
async fn require_node(conn: &mut SqliteConnection, id: &str) -> CoreResult<()> {
    let exists: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM components WHERE id = ?1
         UNION ALL SELECT 1 FROM tasks WHERE id = ?1 LIMIT 1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    if exists.is_none() {
        return Err(CoreError::not_found("Node", id));
    }
    Ok(())
}

async fn exec_insert_component(conn: &mut SqliteConnection, component: &Component) -> CoreResult<()> {
    let metadata_json = serde_json::to_string(&component.metadata)?;
    sqlx::query(
        r#"INSERT INTO components (id, kind, name, description, path, codebase, metadata,
           created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&component.id)
    .bind(component.kind.as_str())
    .bind(&component.name)
    .bind(&component.description)
    .bind(&component.path)
    .bind(&component.codebase)
    .bind(&metadata_json)
    .bind(fmt_ts(component.created_at))
    .bind(fmt_ts(component.updated_at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn exec_insert_task(conn: &mut SqliteConnection, task: &Task) -> CoreResult<()> {
    let metadata_json = serde_json::to_string(&task.metadata)?;
    sqlx::query(
        r#"INSERT INTO tasks (id, name, description, status, progress, codebase, metadata,
           created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&task.id)
    .bind(&task.name)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(task.progress)
    .bind(&task.codebase)
    .bind(&metadata_json)
    .bind(fmt_ts(task.created_at))
    .bind(fmt_ts(task.updated_at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn exec_insert_comment(conn: &mut SqliteConnection, comment: &Comment) -> CoreResult<()> {
    let metadata_json = serde_json::to_string(&comment.metadata)?;
    sqlx::query(
        r#"INSERT INTO comments (id, parent_id, content, author, metadata, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&comment.id)
    .bind(&comment.parent_id)
    .bind(&comment.content)
    .bind(&comment.author)
    .bind(&metadata_json)
    .bind(fmt_ts(comment.created_at))
    .bind(comment.updated_at.map(fmt_ts))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn exec_insert_edge(conn: &mut SqliteConnection, relationship: &Relationship) -> CoreResult<()> {
    let details_json = serde_json::to_string(&relationship.details)?;
    let temporal = relationship.temporal.clone().unwrap_or_default();
    sqlx::query(
        r#"INSERT INTO edges (id, edge_type, source_id, target_id, details,
           time_order, probability, reasoning, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&relationship.id)
    .bind(relationship.rel_type.as_str())
    .bind(&relationship.source_id)
    .bind(&relationship.target_id)
    .bind(&details_json)
    .bind(temporal.time_order.map(i64::from))
    .bind(temporal.probability)
    .bind(&temporal.reasoning)
    .bind(fmt_ts(Utc::now()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Insert an internal HAS_COMMENT or RELATES_TO link.
async fn exec_insert_link(
    conn: &mut SqliteConnection,
    rel_type: RelationshipType,
    source_id: &str,
    target_id: &str,
) -> CoreResult<()> {
    sqlx::query(
        r#"INSERT INTO edges (id, edge_type, source_id, target_id, details, created_at)
           VALUES (?, ?, ?, ?, '{}', ?)"#,
    )
    .bind(mint_id())
    .bind(rel_type.as_str())
    .bind(source_id)
    .bind(target_id)
    .bind(fmt_ts(Utc::now()))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn exec_clear_graph(conn: &mut SqliteConnection) -> CoreResult<()> {
    sqlx::query("DELETE FROM edges").execute(&mut *conn).await?;
    sqlx::query("DELETE FROM comments").execute(&mut *conn).await?;
    sqlx::query("DELETE FROM tasks").execute(&mut *conn).await?;
    sqlx::query("DELETE FROM components").execute(&mut *conn).await?;
    Ok(())
}

// --- row types ------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ComponentRow {
    id: String,
    kind: String,
    name: String,
    description: Option<String>,
    path: Option<String>,
    codebase: Option<String>,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ComponentRow> for Component {
    type Error = CoreError;

    fn try_from(row: ComponentRow) -> CoreResult<Self> {
        let kind = ComponentKind::from_str(&row.kind)
            .ok_or_else(|| CoreError::Internal(format!("unknown component kind {:?}", row.kind)))?;
        Ok(Self {
            id: row.id,
            kind,
            name: row.name,
            description: row.description,
            path: row.path,
            codebase: row.codebase,
            metadata: serde_json::from_str(&row.metadata)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    name: String,
    description: Option<String>,
    status: String,
    progress: f64,
    codebase: Option<String>,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = CoreError;

    fn try_from(row: TaskRow) -> CoreResult<Self> {
        let status = TaskStatus::from_str(&row.status)
            .ok_or_else(|| CoreError::Internal(format!("unknown task status {:?}", row.status)))?;
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            status,
            progress: row.progress,
            codebase: row.codebase,
            related_component_ids: Vec::new(),
            metadata: serde_json::from_str(&row.metadata)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: String,
    parent_id: String,
    content: String,
    author: String,
    metadata: String,
    created_at: String,
    updated_at: Option<String>,
}

impl TryFrom<CommentRow> for Comment {
    type Error = CoreError;

    fn try_from(row: CommentRow) -> CoreResult<Self> {
        Ok(Self {
            id: row.id,
            parent_id: row.parent_id,
            content: row.content,
            author: row.author,
            metadata: serde_json::from_str(&row.metadata)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_opt_ts(row.updated_at.as_deref())?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EdgeRow {
    id: String,
    edge_type: String,
    source_id: String,
    target_id: String,
    details: String,
    time_order: Option<i64>,
    probability: Option<f64>,
    reasoning: Option<String>,
    #[allow(dead_code)]
    created_at: String,
}

impl TryFrom<EdgeRow> for Relationship {
    type Error = CoreError;

    fn try_from(row: EdgeRow) -> CoreResult<Self> {
        let rel_type = RelationshipType::from_str(&row.edge_type)
            .ok_or_else(|| CoreError::Internal(format!("unknown edge type {:?}", row.edge_type)))?;
        let temporal = TemporalHint {
            time_order: row.time_order.map(|v| v as u32),
            probability: row.probability,
            reasoning: row.reasoning,
        };
        Ok(Self {
            id: row.id,
            rel_type,
            source_id: row.source_id,
            target_id: row.target_id,
            details: serde_json::from_str(&row.details)?,
            temporal: if temporal.is_empty() { None } else { Some(temporal) },
        })
    }
}
