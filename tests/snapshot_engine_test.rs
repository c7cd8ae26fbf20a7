//! Integration tests for snapshots and time-travel replay.

mod common;

use codegraph::domain::models::{
    ComponentFilter, ComponentKind, NewComment, NewComponent, NewRelationship, NewTask,
    RelationshipType, TaskStatus,
};
use codegraph::services::change_journal::ChangeHistoryQuery;
use codegraph::CodegraphApi;

async fn seed_graph(api: &CodegraphApi) -> (String, String) {
    let file = api
        .create_component(NewComponent::new(ComponentKind::File, "main.rs").with_codebase("core"))
        .await
        .unwrap();
    let class = api
        .create_component(NewComponent::new(ComponentKind::Class, "Engine").with_codebase("core"))
        .await
        .unwrap();
    api.create_relationship(NewRelationship::new(
        RelationshipType::Contains,
        &file.id,
        &class.id,
    ))
    .await
    .unwrap();
    api.create_task(NewTask::new("tune the engine").with_related(vec![class.id.clone()]))
        .await
        .unwrap();
    api.create_comment(NewComment::new(&file.id, "entry point", "ops"))
        .await
        .unwrap();
    (file.id, class.id)
}

#[tokio::test]
async fn snapshot_round_trip_restores_the_captured_graph() {
    let api = common::setup_api().await;
    let (file_id, class_id) = seed_graph(&api).await;

    let snapshot = api.create_snapshot("baseline", Some("before chaos".into())).await.unwrap();
    assert_eq!(snapshot.payload.components.len(), 2);
    assert_eq!(snapshot.payload.relationships.len(), 1);
    assert_eq!(snapshot.payload.tasks.len(), 1);
    assert_eq!(snapshot.payload.comments.len(), 1);

    let journal_before = api.get_history_stats().await.unwrap().total;

    // Arbitrary mutations after the capture.
    api.delete_component(&file_id).await.unwrap();
    api.create_component(NewComponent::new(ComponentKind::Module, "intruder"))
        .await
        .unwrap();

    let report = api.restore_snapshot(&snapshot.id, false).await.unwrap();
    assert!(!report.dry_run);
    assert_eq!(report.counts.components, 2);
    assert_eq!(report.counts.relationships, 1);
    assert_eq!(report.counts.tasks, 1);
    assert_eq!(report.counts.comments, 1);

    // The captured entities are back, the intruder is gone.
    let file = api.get_component(&file_id).await.unwrap();
    assert_eq!(file.name, "main.rs");
    api.get_component(&class_id).await.unwrap();
    let intruders = api
        .search_components(ComponentFilter { name: Some("intruder".into()), ..Default::default() })
        .await
        .unwrap();
    assert!(intruders.is_empty());

    let comments = api.get_node_comments(&file_id, None).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].content, "entry point");

    let tasks = api.get_tasks(None).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].related_component_ids, vec![class_id.clone()]);

    // Restores rebuild state without journaling: the journal survives intact.
    let journal_after = api.get_history_stats().await.unwrap().total;
    assert_eq!(journal_after, journal_before + 2);
}

#[tokio::test]
async fn restored_graph_serializes_identically_to_the_capture() {
    let api = common::setup_api().await;
    seed_graph(&api).await;

    let baseline = api.create_snapshot("baseline", None).await.unwrap();

    api.create_component(NewComponent::new(ComponentKind::Module, "noise"))
        .await
        .unwrap();
    let task = api.create_task(NewTask::new("more noise")).await.unwrap();
    api.update_task_status(&task.id, TaskStatus::InProgress, Some(0.5))
        .await
        .unwrap();

    api.restore_snapshot(&baseline.id, false).await.unwrap();

    // A fresh capture of the restored graph must equal the original capture
    // entity-for-entity.
    let after = api.create_snapshot("after-restore", None).await.unwrap();
    assert_eq!(baseline.payload, after.payload);
}

#[tokio::test]
async fn replay_is_idempotent_at_a_fixed_target() {
    let api = common::setup_api().await;
    let component = api
        .create_component(NewComponent::new(ComponentKind::File, "stable.rs"))
        .await
        .unwrap();
    api.update_component(
        &component.id,
        codegraph::domain::models::ComponentPatch {
            description: Some("settled".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    api.create_task(NewTask::new("stable work")).await.unwrap();

    let feed = api.get_change_history(ChangeHistoryQuery::default()).await.unwrap();
    let target = feed[0].timestamp;

    api.replay_to_timestamp(target, false).await.unwrap();
    let first = api.create_snapshot("first-replay", None).await.unwrap();

    // Mutate, then replay to the same target again: same end state.
    api.create_component(NewComponent::new(ComponentKind::Module, "drift"))
        .await
        .unwrap();
    api.replay_to_timestamp(target, false).await.unwrap();
    let second = api.create_snapshot("second-replay", None).await.unwrap();

    assert_eq!(first.payload, second.payload);
}

#[tokio::test]
async fn restore_dry_run_changes_nothing() {
    let api = common::setup_api().await;
    seed_graph(&api).await;
    let snapshot = api.create_snapshot("s", None).await.unwrap();

    let extra = api
        .create_component(NewComponent::new(ComponentKind::Module, "extra"))
        .await
        .unwrap();

    let report = api.restore_snapshot(&snapshot.id, true).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.counts.components, 2);

    // The post-snapshot component is still there.
    api.get_component(&extra.id).await.unwrap();
}

#[tokio::test]
async fn restoring_an_unknown_snapshot_is_not_found() {
    let api = common::setup_api().await;
    let err = api.restore_snapshot("missing", false).await.unwrap_err();
    assert_eq!(err.kind(), codegraph::ErrorKind::NotFound);
}

#[tokio::test]
async fn list_snapshots_returns_metadata_newest_first() {
    let api = common::setup_api().await;
    seed_graph(&api).await;
    api.create_snapshot("first", None).await.unwrap();
    api.create_snapshot("second", Some("later".into())).await.unwrap();

    let listing = api.list_snapshots().await.unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].name, "second");
    assert_eq!(listing[0].description.as_deref(), Some("later"));
    assert_eq!(listing[1].name, "first");
    assert_eq!(listing[0].component_count, 2);
    assert!(listing[0].timestamp > listing[1].timestamp);
}

#[tokio::test]
async fn replay_rebuilds_state_up_to_the_target() {
    let api = common::setup_api().await;

    let component = api
        .create_component(NewComponent::new(ComponentKind::File, "replayed.rs"))
        .await
        .unwrap();
    api.update_component(
        &component.id,
        codegraph::domain::models::ComponentPatch {
            description: Some("second state".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    api.delete_component(&component.id).await.unwrap();

    // Timestamps of the three journaled operations, oldest first.
    let feed = api.get_change_history(ChangeHistoryQuery::default()).await.unwrap();
    let t_update = feed[1].timestamp;

    let report = api.replay_to_timestamp(t_update, false).await.unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.outcomes.len(), 2);

    // The graph sits at the post-update, pre-delete state.
    let replayed = api.get_component(&component.id).await.unwrap();
    assert_eq!(replayed.description.as_deref(), Some("second state"));
}

#[tokio::test]
async fn replay_dry_run_plans_without_touching_the_graph() {
    let api = common::setup_api().await;
    let component = api
        .create_component(NewComponent::new(ComponentKind::File, "planned.rs"))
        .await
        .unwrap();
    let feed = api.get_change_history(ChangeHistoryQuery::default()).await.unwrap();
    let target = feed[0].timestamp;

    let plan_one = api.replay_to_timestamp(target, true).await.unwrap();
    assert!(plan_one.dry_run);
    assert_eq!(plan_one.planned.len(), 1);
    assert!(plan_one.outcomes.is_empty());

    // Intervening non-journal churn must not change the plan.
    api.create_snapshot("mid-plan", None).await.unwrap();
    let plan_two = api.replay_to_timestamp(target, true).await.unwrap();
    assert_eq!(plan_one.planned, plan_two.planned);

    // Dry runs leave the live graph alone.
    api.get_component(&component.id).await.unwrap();
}

#[tokio::test]
async fn replay_rebuilds_and_deletes_relationships() {
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
    api.delete_relationship(
        &api.create_relationship(NewRelationship::new(RelationshipType::Uses, &a.id, &b.id))
            .await
            .unwrap()
            .id,
    )
    .await
    .unwrap();

    let feed = api.get_change_history(ChangeHistoryQuery::default()).await.unwrap();
    let newest = feed[0].timestamp;

    let report = api.replay_to_timestamp(newest, false).await.unwrap();
    // 2 component creates + 2 relationship creates + 2 relationship deletes.
    assert_eq!(report.outcomes.len(), 6);
    assert_eq!(report.failed, 0);

    // Both relationships were created and then deleted during replay.
    let relations = api
        .get_component_relationships(&a.id, codegraph::domain::models::Direction::Both)
        .await
        .unwrap();
    assert!(relations.is_empty());
}

#[tokio::test]
async fn replay_fails_soft_on_unmatchable_relationship_deletes() {
    use codegraph::adapters::sqlite::SqliteJournalRepository;
    use codegraph::domain::models::{
        ChangeEvent, ChangeOperation, EntityKind, EntityState, Relationship,
    };
    use codegraph::domain::ports::JournalRepository;

    let api = common::setup_api().await;
    let a = api
        .create_component(NewComponent::new(ComponentKind::File, "survivor"))
        .await
        .unwrap();

    // A delete entry for an edge no journal entry ever created: replay can
    // match it neither by id nor by its (source, target, type) triple.
    let repo = SqliteJournalRepository::new(api.pool().clone());
    let orphan_delete = ChangeEvent {
        id: "orphan-delete".into(),
        operation: ChangeOperation::DeleteRelationship,
        entity_kind: EntityKind::Relationship,
        entity_id: "edge-that-never-was".into(),
        before_state: Some(EntityState::Relationship(Relationship {
            id: "edge-that-never-was".into(),
            rel_type: RelationshipType::Calls,
            source_id: "ghost-src".into(),
            target_id: "ghost-dst".into(),
            details: Default::default(),
            temporal: None,
        })),
        after_state: None,
        timestamp: chrono::Utc::now(),
        session_id: "test".into(),
        user_id: None,
        source: "test".into(),
        metadata: Default::default(),
    };
    repo.append(&orphan_delete).await.unwrap();
    // Appending the same entry id again is a no-op.
    repo.append(&orphan_delete).await.unwrap();

    let stats = api.get_history_stats().await.unwrap();
    assert_eq!(stats.total, 2);

    let report = api
        .replay_to_timestamp(chrono::Utc::now(), false)
        .await
        .unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.failed, 1);
    let failure = report.outcomes.iter().find(|o| !o.applied).unwrap();
    assert_eq!(failure.event_id, "orphan-delete");
    assert!(failure.error.is_some());

    // The failure did not stop the rest of the replay.
    api.get_component(&a.id).await.unwrap();
}

#[tokio::test]
async fn replay_applies_bulk_entries_individually() {
    let api = common::setup_api().await;
    api.create_components_bulk(vec![
        NewComponent::new(ComponentKind::File, "b1"),
        NewComponent::new(ComponentKind::File, "b2"),
    ])
    .await
    .unwrap();
    let task = api.create_task(NewTask::new("bulk follower")).await.unwrap();
    api.update_task_status(&task.id, TaskStatus::Done, Some(1.0))
        .await
        .unwrap();

    let feed = api.get_change_history(ChangeHistoryQuery::default()).await.unwrap();
    let newest = feed[0].timestamp;

    let report = api.replay_to_timestamp(newest, false).await.unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(report.applied, 4);

    let rebuilt = api.get_task(&task.id).await.unwrap();
    assert_eq!(rebuilt.status, TaskStatus::Done);
    let files = api
        .search_components(ComponentFilter {
            kind: Some(ComponentKind::File),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(files.len(), 2);
}
