//! Fixtures shared by the unit tests.

use serde_json::Value;
use sqlx::SqliteConnection;

use crate::db::models::{
    events::Event, parsed_templates::ParsedTemplate, raw_templates::RawTemplate, record::Record, resources::Resource,
    stacks::Stack,
};
use crate::types::{ParsedTemplateId, RawTemplateId, StackId};

pub async fn create_test_raw_template(conn: &mut SqliteConnection, template: Value) -> RawTemplate {
    let mut raw = RawTemplate::new(template);
    raw.save(conn).await.expect("Failed to create test raw template");
    raw
}

pub async fn create_test_parsed_template(
    conn: &mut SqliteConnection,
    template: Value,
    raw_template_id: RawTemplateId,
) -> ParsedTemplate {
    let mut parsed = ParsedTemplate::new(template, raw_template_id);
    parsed.save(conn).await.expect("Failed to create test parsed template");
    parsed
}

pub async fn create_test_stack(conn: &mut SqliteConnection, name: &str, raw_template_id: RawTemplateId) -> Stack {
    let mut stack = Stack::new(name, raw_template_id);
    stack.save(conn).await.expect("Failed to create test stack");
    stack
}

pub async fn create_test_resource(
    conn: &mut SqliteConnection,
    name: &str,
    stack_id: StackId,
    parsed_template_id: Option<ParsedTemplateId>,
) -> Resource {
    let mut resource = Resource::new(name, stack_id);
    resource.parsed_template_id = parsed_template_id;
    resource.save(conn).await.expect("Failed to create test resource");
    resource
}

pub async fn create_test_event(conn: &mut SqliteConnection, name: &str, stack_id: StackId) -> Event {
    let mut event = Event::new(name, stack_id);
    event.save(conn).await.expect("Failed to create test event");
    event
}
