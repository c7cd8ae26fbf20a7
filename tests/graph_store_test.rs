//! Integration tests for the graph store: CRUD, cascades, bulk transactions,
//! search, and analysis queries against an in-memory database.

mod common;

use codegraph::domain::models::{
    ChangeOperation, ComponentFilter, ComponentKind, ComponentPatch, Direction, MetadataValue,
    NewComment, NewComponent, NewRelationship, NewTask, RelationshipType, TaskSearch, TaskStatus,
};
use codegraph::services::facade::entity_history;
use codegraph::ErrorKind;

#[tokio::test]
async fn component_lifecycle_is_fully_journaled() {
    let api = common::setup_api().await;

    let created = api
        .create_component(NewComponent::new(ComponentKind::File, "a.js"))
        .await
        .unwrap();
    let updated = api
        .update_component(
            &created.id,
            ComponentPatch { description: Some("root".into()), ..ComponentPatch::default() },
        )
        .await
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.description.as_deref(), Some("root"));

    api.delete_component(&created.id).await.unwrap();

    let history = api.get_change_history(entity_history(&created.id)).await.unwrap();
    assert_eq!(history.len(), 3);

    // Newest first: delete, update, create.
    assert_eq!(history[0].operation, ChangeOperation::DeleteComponent);
    assert!(history[0].before_state.is_some());
    assert!(history[0].after_state.is_none());

    assert_eq!(history[1].operation, ChangeOperation::UpdateComponent);
    let before = history[1].before_state.as_ref().unwrap().as_component().unwrap();
    let after = history[1].after_state.as_ref().unwrap().as_component().unwrap();
    assert!(before.description.is_none());
    assert_eq!(after.description.as_deref(), Some("root"));

    assert_eq!(history[2].operation, ChangeOperation::CreateComponent);
    assert!(history[2].before_state.is_none());
    let after = history[2].after_state.as_ref().unwrap().as_component().unwrap();
    assert_eq!(after.name, "a.js");

    let err = api.get_component(&created.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn deleting_a_component_cascades_to_edges_and_comments() {
    let api = common::setup_api().await;

    let file = api
        .create_component(NewComponent::new(ComponentKind::File, "f"))
        .await
        .unwrap();
    let class = api
        .create_component(NewComponent::new(ComponentKind::Class, "K"))
        .await
        .unwrap();
    api.create_relationship(NewRelationship::new(
        RelationshipType::Contains,
        &file.id,
        &class.id,
    ))
    .await
    .unwrap();
    let comment = api
        .create_comment(NewComment::new(&file.id, "hi", "u"))
        .await
        .unwrap();

    api.delete_component(&file.id).await.unwrap();

    // The other endpoint survives; the comment and the edge do not.
    assert!(api.get_component(&class.id).await.is_ok());
    assert_eq!(api.get_comment(&comment.id).await.unwrap_err().kind(), ErrorKind::NotFound);
    let relations = api
        .get_component_relationships(&class.id, Direction::Both)
        .await
        .unwrap();
    assert!(relations.is_empty());
}

#[tokio::test]
async fn duplicate_component_id_is_a_conflict() {
    let api = common::setup_api().await;
    api.create_component(NewComponent::new(ComponentKind::File, "one").with_id("fixed"))
        .await
        .unwrap();
    let err = api
        .create_component(NewComponent::new(ComponentKind::File, "two").with_id("fixed"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // The stored component is untouched.
    assert_eq!(api.get_component("fixed").await.unwrap().name, "one");
}

#[tokio::test]
async fn relationship_endpoints_must_exist() {
    let api = common::setup_api().await;
    let a = api
        .create_component(NewComponent::new(ComponentKind::Module, "a"))
        .await
        .unwrap();

    let err = api
        .create_relationship(NewRelationship::new(RelationshipType::Uses, &a.id, "ghost"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn internal_edges_never_surface_in_relationship_queries() {
    let api = common::setup_api().await;
    let a = api
        .create_component(NewComponent::new(ComponentKind::File, "a"))
        .await
        .unwrap();
    let b = api
        .create_component(NewComponent::new(ComponentKind::Class, "b"))
        .await
        .unwrap();
    api.create_relationship(NewRelationship::new(RelationshipType::Contains, &a.id, &b.id))
        .await
        .unwrap();
    api.create_comment(NewComment::new(&a.id, "note", "author"))
        .await
        .unwrap();
    api.create_task(NewTask::new("wire it").with_related(vec![a.id.clone()]))
        .await
        .unwrap();

    let relations = api
        .get_component_relationships(&a.id, Direction::Both)
        .await
        .unwrap();
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].relationship.rel_type, RelationshipType::Contains);
    assert_eq!(relations[0].direction, Direction::Outgoing);
    assert_eq!(relations[0].neighbor.id, b.id);

    // The internal kinds are rejected outright as inputs.
    let err = api
        .create_relationship(NewRelationship::new(RelationshipType::HasComment, &a.id, &b.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn direction_filter_tags_rows() {
    let api = common::setup_api().await;
    let hub = api
        .create_component(NewComponent::new(ComponentKind::Module, "hub"))
        .await
        .unwrap();
    let up = api
        .create_component(NewComponent::new(ComponentKind::Module, "up"))
        .await
        .unwrap();
    let down = api
        .create_component(NewComponent::new(ComponentKind::Module, "down"))
        .await
        .unwrap();
    api.create_relationship(NewRelationship::new(RelationshipType::Imports, &up.id, &hub.id))
        .await
        .unwrap();
    api.create_relationship(NewRelationship::new(RelationshipType::Imports, &hub.id, &down.id))
        .await
        .unwrap();

    let incoming = api
        .get_component_relationships(&hub.id, Direction::Incoming)
        .await
        .unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].neighbor.id, up.id);

    let outgoing = api
        .get_component_relationships(&hub.id, Direction::Outgoing)
        .await
        .unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].neighbor.id, down.id);

    let both = api
        .get_component_relationships(&hub.id, Direction::Both)
        .await
        .unwrap();
    assert_eq!(both.len(), 2);
}

#[tokio::test]
async fn dependency_tree_is_depth_bounded() {
    let api = common::setup_api().await;
    let mut ids = Vec::new();
    for name in ["a", "b", "c", "d", "e"] {
        let component = api
            .create_component(NewComponent::new(ComponentKind::Module, name))
            .await
            .unwrap();
        ids.push(component.id);
    }
    // Chain a -> b -> c -> d -> e, plus a side branch a -> e.
    for window in ids.windows(2) {
        api.create_relationship(NewRelationship::new(
            RelationshipType::DependsOn,
            &window[0],
            &window[1],
        ))
        .await
        .unwrap();
    }
    api.create_relationship(NewRelationship::new(RelationshipType::DependsOn, &ids[0], &ids[4]))
        .await
        .unwrap();

    let mut paths = api.get_dependency_tree(&ids[0], Some(3)).await.unwrap();
    paths.sort();
    // Depth 3: the chain stops at d; the side branch terminates at e.
    let mut expected = vec![
        vec![ids[0].clone(), ids[1].clone(), ids[2].clone(), ids[3].clone()],
        vec![ids[0].clone(), ids[4].clone()],
    ];
    expected.sort();
    assert_eq!(paths, expected);

    let default_depth = api.get_dependency_tree(&ids[0], None).await.unwrap();
    assert!(default_depth.iter().all(|path| path.len() <= 4));
}

#[tokio::test]
async fn dependency_tree_survives_cycles() {
    let api = common::setup_api().await;
    let a = api
        .create_component(NewComponent::new(ComponentKind::Module, "cy-a"))
        .await
        .unwrap();
    let b = api
        .create_component(NewComponent::new(ComponentKind::Module, "cy-b"))
        .await
        .unwrap();
    api.create_relationship(NewRelationship::new(RelationshipType::DependsOn, &a.id, &b.id))
        .await
        .unwrap();
    api.create_relationship(NewRelationship::new(RelationshipType::DependsOn, &b.id, &a.id))
        .await
        .unwrap();

    // Expansion must terminate at the depth bound despite the cycle.
    let paths = api.get_dependency_tree(&a.id, Some(4)).await.unwrap();
    assert!(!paths.is_empty());
    assert!(paths.iter().all(|path| path.len() <= 5));
}

#[tokio::test]
async fn bulk_create_rolls_back_entirely_on_conflict() {
    let api = common::setup_api().await;
    api.create_component(NewComponent::new(ComponentKind::File, "taken").with_id("dup"))
        .await
        .unwrap();
    let stats_before = api.get_history_stats().await.unwrap();

    let err = api
        .create_components_bulk(vec![
            NewComponent::new(ComponentKind::File, "fresh").with_id("fresh-1"),
            NewComponent::new(ComponentKind::File, "collides").with_id("dup"),
        ])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Nothing from the failed bulk exists, and nothing was journaled.
    assert_eq!(api.get_component("fresh-1").await.unwrap_err().kind(), ErrorKind::NotFound);
    let stats_after = api.get_history_stats().await.unwrap();
    assert_eq!(stats_before.total, stats_after.total);
}

#[tokio::test]
async fn bulk_create_journals_each_item_with_bulk_metadata() {
    let api = common::setup_api().await;
    let components = api
        .create_components_bulk(vec![
            NewComponent::new(ComponentKind::File, "x.rs"),
            NewComponent::new(ComponentKind::File, "y.rs"),
            NewComponent::new(ComponentKind::File, "z.rs"),
        ])
        .await
        .unwrap();
    assert_eq!(components.len(), 3);

    let history = api
        .get_change_history(codegraph::services::facade::operation_history(
            ChangeOperation::CreateComponentsBulk,
        ))
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    for entry in &history {
        assert_eq!(entry.metadata.get("bulkOperation"), Some(&MetadataValue::Bool(true)));
        assert_eq!(entry.metadata.get("totalCount"), Some(&MetadataValue::Integer(3)));
    }
}

#[tokio::test]
async fn component_search_filters_compose() {
    let api = common::setup_api().await;
    api.create_component(
        NewComponent::new(ComponentKind::File, "auth/login.rs").with_codebase("core"),
    )
    .await
    .unwrap();
    api.create_component(
        NewComponent::new(ComponentKind::File, "auth/logout.rs").with_codebase("core"),
    )
    .await
    .unwrap();
    api.create_component(
        NewComponent::new(ComponentKind::Class, "LoginHandler").with_codebase("web"),
    )
    .await
    .unwrap();

    let hits = api
        .search_components(ComponentFilter {
            name: Some("auth/".into()),
            ..ComponentFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);

    let hits = api
        .search_components(ComponentFilter {
            kind: Some(ComponentKind::Class),
            codebase: Some("web".into()),
            ..ComponentFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "LoginHandler");

    let misses = api
        .search_components(ComponentFilter {
            kind: Some(ComponentKind::Class),
            codebase: Some("core".into()),
            ..ComponentFilter::default()
        })
        .await
        .unwrap();
    assert!(misses.is_empty());
}

#[tokio::test]
async fn task_lifecycle_and_search() {
    let api = common::setup_api().await;
    let component = api
        .create_component(NewComponent::new(ComponentKind::Feature, "payments"))
        .await
        .unwrap();

    let task = api
        .create_task(
            NewTask::new("implement checkout")
                .with_status(TaskStatus::Todo)
                .with_related(vec![component.id.clone()]),
        )
        .await
        .unwrap();
    assert_eq!(task.progress, 0.0);
    assert_eq!(task.related_component_ids, vec![component.id.clone()]);

    let task = api
        .update_task_status(&task.id, TaskStatus::InProgress, Some(0.4))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
    assert!((task.progress - 0.4).abs() < f64::EPSILON);

    let todo = api.get_tasks(Some(TaskStatus::Todo)).await.unwrap();
    assert!(todo.is_empty());
    let in_progress = api.get_tasks(Some(TaskStatus::InProgress)).await.unwrap();
    assert_eq!(in_progress.len(), 1);

    let hits = api
        .search_tasks(TaskSearch {
            text_query: Some("checkout".into()),
            statuses: vec![TaskStatus::InProgress],
            progress_min: Some(0.2),
            related_component_ids: vec![component.id.clone()],
            ..TaskSearch::default()
        })
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, task.id);

    let misses = api
        .search_tasks(TaskSearch {
            progress_min: Some(0.5),
            ..TaskSearch::default()
        })
        .await
        .unwrap();
    assert!(misses.is_empty());
}

#[tokio::test]
async fn rejected_inputs_leave_no_trace() {
    let api = common::setup_api().await;

    let err = api.create_task(NewTask::new("t").with_progress(1.5)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = api
        .create_component(NewComponent::new(ComponentKind::File, "  "))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = api
        .update_task_status("missing", TaskStatus::Done, Some(2.0))
        .await
        .unwrap_err();
    // Validation precedes the lookup.
    assert_eq!(err.kind(), ErrorKind::Validation);

    let stats = api.get_history_stats().await.unwrap();
    assert_eq!(stats.total, 0);
}

#[tokio::test]
async fn comments_list_newest_first_and_update_in_place() {
    let api = common::setup_api().await;
    let node = api
        .create_component(NewComponent::new(ComponentKind::File, "noisy.rs"))
        .await
        .unwrap();

    let first = api
        .create_comment(NewComment::new(&node.id, "first", "alice"))
        .await
        .unwrap();
    let second = api
        .create_comment(NewComment::new(&node.id, "second", "bob"))
        .await
        .unwrap();

    let comments = api.get_node_comments(&node.id, None).await.unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].id, second.id);
    assert_eq!(comments[1].id, first.id);

    let updated = api.update_comment(&first.id, "first, revised".into()).await.unwrap();
    assert_eq!(updated.content, "first, revised");
    assert!(updated.updated_at.is_some());

    api.delete_comment(&second.id).await.unwrap();
    let comments = api.get_node_comments(&node.id, None).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].id, first.id);
}

#[tokio::test]
async fn comments_attach_to_tasks_too() {
    let api = common::setup_api().await;
    let task = api.create_task(NewTask::new("review")).await.unwrap();
    let comment = api
        .create_comment(NewComment::new(&task.id, "looks good", "carol"))
        .await
        .unwrap();
    assert_eq!(comment.parent_id, task.id);

    let err = api
        .create_comment(NewComment::new("no-such-node", "hello", "dave"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn codebase_overview_counts_by_kind_descending() {
    let api = common::setup_api().await;
    for name in ["a.rs", "b.rs", "c.rs"] {
        api.create_component(NewComponent::new(ComponentKind::File, name).with_codebase("core"))
            .await
            .unwrap();
    }
    let class = api
        .create_component(NewComponent::new(ComponentKind::Class, "K").with_codebase("core"))
        .await
        .unwrap();
    let file = api
        .search_components(ComponentFilter {
            name: Some("a.rs".into()),
            ..ComponentFilter::default()
        })
        .await
        .unwrap()
        .remove(0);
    api.create_relationship(NewRelationship::new(RelationshipType::Contains, &file.id, &class.id))
        .await
        .unwrap();
    // A different codebase stays out of the overview.
    api.create_component(NewComponent::new(ComponentKind::File, "other").with_codebase("web"))
        .await
        .unwrap();

    let overview = api.get_codebase_overview("core").await.unwrap();
    assert_eq!(overview.total_components, 4);
    assert_eq!(overview.kinds[0].kind, "FILE");
    assert_eq!(overview.kinds[0].count, 3);
    assert_eq!(overview.kinds[1].kind, "CLASS");
    assert_eq!(overview.kinds[1].count, 1);
    assert_eq!(overview.relationship_count, 1);
}

#[tokio::test]
async fn explicit_relationship_delete_is_journaled() {
    let api = common::setup_api().await;
    let a = api
        .create_component(NewComponent::new(ComponentKind::File, "a"))
        .await
        .unwrap();
    let b = api
        .create_component(NewComponent::new(ComponentKind::File, "b"))
        .await
        .unwrap();
    let rel = api
        .create_relationship(NewRelationship::new(RelationshipType::Calls, &a.id, &b.id))
        .await
        .unwrap();

    api.delete_relationship(&rel.id).await.unwrap();
    let relations = api.get_component_relationships(&a.id, Direction::Both).await.unwrap();
    assert!(relations.is_empty());

    let history = api.get_change_history(entity_history(&rel.id)).await.unwrap();
    assert_eq!(history[0].operation, ChangeOperation::DeleteRelationship);
    let before = history[0].before_state.as_ref().unwrap().as_relationship().unwrap();
    assert_eq!(before.rel_type, RelationshipType::Calls);
}
