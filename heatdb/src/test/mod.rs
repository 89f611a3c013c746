//! End-to-end tests over the whole persistence layer.

use serde_json::json;
use sqlx::SqlitePool;

use crate::db::{
    errors::DbError,
    handlers::{Events, ListFilter, ParsedTemplates, Repository, Resources, Stacks},
    models::{
        events::Event, parsed_templates::ParsedTemplate, raw_templates::RawTemplate, record::Record,
        resources::{Resource, ResourceState},
        stacks::Stack,
    },
};

/// Template to stack to resource, then the stack goes away
#[sqlx::test]
#[test_log::test]
async fn test_stack_lifecycle(pool: SqlitePool) {
    let mut tx = pool.begin().await.unwrap();

    let mut raw = RawTemplate::new(json!({"a": 1}));
    raw.save(&mut tx).await.unwrap();

    let mut parsed = ParsedTemplate::new(json!({"a": 1, "parsed": true}), raw.id().unwrap());
    parsed.save(&mut tx).await.unwrap();

    let mut stack = Stack::new("s1", raw.id().unwrap());
    stack.save(&mut tx).await.unwrap();

    let mut resource = Resource::new("r1", stack.id().unwrap()).with_parsed_template_id(parsed.id().unwrap());
    resource.set_state(ResourceState::CreateComplete, None);
    resource.save(&mut tx).await.unwrap();

    let mut event = Event::new("CREATE_COMPLETE", stack.id().unwrap());
    event.save(&mut tx).await.unwrap();

    tx.commit().await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let found = Resources::new(&mut conn)
        .get_by_name_and_stack("r1", stack.id().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.resource_state(), Some(ResourceState::CreateComplete));

    stack.delete(&mut conn).await.unwrap();

    assert!(
        Resources::new(&mut conn)
            .get_by_name_and_stack("r1", stack.id().unwrap())
            .await
            .unwrap()
            .is_none()
    );
    assert!(Resources::new(&mut conn).get_by_id(resource.id().unwrap()).await.unwrap().is_none());
    assert!(Events::new(&mut conn).list_by_stack(stack.id().unwrap()).await.unwrap().is_empty());

    // The stack row itself is only flagged
    let stored = Stacks::new(&mut conn).get_by_id(stack.id().unwrap()).await.unwrap().unwrap();
    assert!(stored.is_deleted());
    assert!(Stacks::new(&mut conn).list(&ListFilter::default()).await.unwrap().is_empty());

    // Templates are untouched by a stack delete
    assert!(!RawTemplate::find(&mut conn, raw.id().unwrap()).await.unwrap().unwrap().is_deleted());
    assert!(ParsedTemplate::find(&mut conn, parsed.id().unwrap()).await.unwrap().is_some());
}

#[sqlx::test]
#[test_log::test]
async fn test_raw_template_delete_cascades_through_stack(pool: SqlitePool) {
    let mut conn = pool.acquire().await.unwrap();

    let mut raw = RawTemplate::new(json!({"Resources": {}}));
    raw.save(&mut conn).await.unwrap();
    let mut parsed = ParsedTemplate::new(json!({"Resources": {}}), raw.id().unwrap());
    parsed.save(&mut conn).await.unwrap();
    let mut stack = Stack::new("cascade", raw.id().unwrap());
    stack.save(&mut conn).await.unwrap();
    let mut resource = Resource::new("server", stack.id().unwrap()).with_parsed_template_id(parsed.id().unwrap());
    resource.save(&mut conn).await.unwrap();
    let mut event = Event::new("CREATE_COMPLETE", stack.id().unwrap());
    event.save(&mut conn).await.unwrap();

    raw.delete(&mut conn).await.unwrap();

    assert!(RawTemplate::find(&mut conn, raw.id().unwrap()).await.unwrap().unwrap().is_deleted());
    assert!(ParsedTemplates::new(&mut conn).get_by_raw_template(raw.id().unwrap()).await.unwrap().is_none());
    assert!(Stack::find(&mut conn, stack.id().unwrap()).await.unwrap().is_none());
    assert!(Resource::find(&mut conn, resource.id().unwrap()).await.unwrap().is_none());
    assert!(Event::find(&mut conn, event.id().unwrap()).await.unwrap().is_none());

    // The name is free again once the stack row is gone
    let mut other = RawTemplate::new(json!({}));
    other.save(&mut conn).await.unwrap();
    Stack::new("cascade", other.id().unwrap()).save(&mut conn).await.unwrap();
}

#[sqlx::test]
#[test_log::test]
async fn test_failed_save_leaves_transaction_usable(pool: SqlitePool) {
    let mut tx = pool.begin().await.unwrap();

    let mut raw = RawTemplate::new(json!({}));
    raw.save(&mut tx).await.unwrap();
    Stack::new("first", raw.id().unwrap()).save(&mut tx).await.unwrap();

    let err = Stack::new("first", raw.id().unwrap()).save(&mut tx).await.unwrap_err();
    assert!(matches!(err, DbError::UniqueViolation { .. }));

    Stack::new("second", raw.id().unwrap()).save(&mut tx).await.unwrap();
    tx.commit().await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    let names: Vec<_> = Stacks::new(&mut conn)
        .list(&ListFilter::default())
        .await
        .unwrap()
        .into_iter()
        .filter_map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[sqlx::test]
#[test_log::test]
async fn test_soft_delete_is_idempotent(pool: SqlitePool) {
    let mut conn = pool.acquire().await.unwrap();

    let mut raw = RawTemplate::new(json!({}));
    raw.save(&mut conn).await.unwrap();
    let mut stack = Stack::new("twice", raw.id().unwrap());
    stack.save(&mut conn).await.unwrap();

    stack.delete(&mut conn).await.unwrap();
    let first = stack.deleted_at().unwrap();
    stack.delete(&mut conn).await.unwrap();

    assert!(stack.deleted_at().unwrap() >= first);
    assert!(stack.is_deleted());
}
