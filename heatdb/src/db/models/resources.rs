//! Database model for provisioned resources.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::db::errors::{DbError, Result};
use crate::db::handlers::{ParsedTemplates, Repository, Stacks};
use crate::db::models::parsed_templates::ParsedTemplate;
use crate::db::models::record::{FieldValue, Lazy, Record, RecordMeta};
use crate::db::models::stacks::Stack;
use crate::db::schema::{ColumnDef, ColumnKind, OnDelete, TableDef};
use crate::types::{ParsedTemplateId, ResourceId, StackId};

/// Lifecycle states the engine writes to `resource.state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceState {
    InProgress,
    CreateFailed,
    CreateComplete,
    DeleteInProgress,
    DeleteFailed,
    DeleteComplete,
}

impl ResourceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::CreateFailed => "CREATE_FAILED",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::DeleteComplete => "DELETE_COMPLETE",
        }
    }

    /// Whether the engine has stopped working on the resource
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress | Self::DeleteInProgress)
    }
}

impl std::fmt::Display for ResourceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(Self::InProgress),
            "CREATE_FAILED" => Ok(Self::CreateFailed),
            "CREATE_COMPLETE" => Ok(Self::CreateComplete),
            "DELETE_IN_PROGRESS" => Ok(Self::DeleteInProgress),
            "DELETE_FAILED" => Ok(Self::DeleteFailed),
            "DELETE_COMPLETE" => Ok(Self::DeleteComplete),
            _ => Err(format!("Unknown resource state: {}", s)),
        }
    }
}

/// One provisioned infrastructure element of a stack.
#[derive(Debug, Clone, Default, FromRow)]
pub struct Resource {
    #[sqlx(flatten)]
    pub meta: RecordMeta,
    /// Free-form; see [`ResourceState`] for the values the engine writes
    pub state: Option<String>,
    pub name: String,
    pub nova_instance: Option<String>,
    pub state_description: Option<String>,
    pub parsed_template_id: Option<ParsedTemplateId>,
    pub stack_id: StackId,
    /// A single resource id. Not a foreign key.
    pub depends_on: Option<ResourceId>,
    #[sqlx(skip)]
    stack: Lazy<Stack>,
    #[sqlx(skip)]
    parsed_template: Lazy<Option<ParsedTemplate>>,
}

impl Resource {
    pub fn new(name: impl Into<String>, stack_id: StackId) -> Self {
        Self {
            name: name.into(),
            stack_id,
            ..Default::default()
        }
    }

    pub fn with_parsed_template_id(mut self, parsed_template_id: ParsedTemplateId) -> Self {
        self.parsed_template_id = Some(parsed_template_id);
        self
    }

    /// The state as a known [`ResourceState`], if it is one
    pub fn resource_state(&self) -> Option<ResourceState> {
        self.state.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn set_state(&mut self, state: ResourceState, description: Option<String>) {
        self.state = Some(state.as_str().to_string());
        self.state_description = description;
    }

    pub async fn stack(&mut self, conn: &mut SqliteConnection) -> Result<&Stack> {
        let id = self.stack_id;
        self.stack
            .get_or_try_load(move || async move { Stacks::new(conn).get_by_id(id).await?.ok_or(DbError::NotFound) })
            .await
    }

    /// The template this resource was declared in, if any
    pub async fn parsed_template(&mut self, conn: &mut SqliteConnection) -> Result<Option<&ParsedTemplate>> {
        let id = self.parsed_template_id;
        let parsed = self
            .parsed_template
            .get_or_try_load(move || async move {
                match id {
                    Some(id) => ParsedTemplates::new(conn).get_by_id(id).await,
                    None => Ok(None),
                }
            })
            .await?;
        Ok(parsed.as_ref())
    }

    pub fn with_stack(mut self, stack: Stack) -> Self {
        self.stack.set(stack);
        self
    }

    pub fn with_parsed_template(mut self, parsed: Option<ParsedTemplate>) -> Self {
        self.parsed_template.set(parsed);
        self
    }

    pub fn invalidate_relations(&mut self) {
        self.stack.invalidate();
        self.parsed_template.invalidate();
    }
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("state", ColumnKind::Text),
    ColumnDef::new("name", ColumnKind::Text).required(),
    ColumnDef::new("nova_instance", ColumnKind::Text),
    ColumnDef::new("state_description", ColumnKind::Text),
    ColumnDef::new("parsed_template_id", ColumnKind::Integer).references("parsed_template", OnDelete::SetNull),
    ColumnDef::new("stack_id", ColumnKind::Integer)
        .required()
        .references("stack", OnDelete::Cascade),
    ColumnDef::new("depends_on", ColumnKind::Integer),
];

impl Record for Resource {
    const TABLE: &'static TableDef = &TableDef {
        name: "resource",
        columns: COLUMNS,
    };

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn column(&self, name: &str) -> Option<FieldValue> {
        match name {
            "state" => Some(self.state.clone().into()),
            "name" => Some(self.name.clone().into()),
            "nova_instance" => Some(self.nova_instance.clone().into()),
            "state_description" => Some(self.state_description.clone().into()),
            "parsed_template_id" => Some(self.parsed_template_id.into()),
            "stack_id" => Some(self.stack_id.into()),
            "depends_on" => Some(self.depends_on.into()),
            _ => None,
        }
    }

    fn set_column(&mut self, name: &str, value: FieldValue) {
        match name {
            "state" => self.state = value.into_text(),
            "name" => {
                if let Some(name) = value.into_text() {
                    self.name = name;
                }
            }
            "nova_instance" => self.nova_instance = value.into_text(),
            "state_description" => self.state_description = value.into_text(),
            "parsed_template_id" => self.parsed_template_id = value.into_i64(),
            "stack_id" => {
                if let Some(id) = value.into_i64() {
                    self.stack_id = id;
                }
            }
            "depends_on" => self.depends_on = value.into_i64(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::record::FieldError;
    use crate::test_utils::{create_test_parsed_template, create_test_raw_template, create_test_resource, create_test_stack};
    use serde_json::json;
    use sqlx::SqlitePool;

    #[test]
    fn test_state_strings() {
        for state in [
            ResourceState::InProgress,
            ResourceState::CreateFailed,
            ResourceState::CreateComplete,
            ResourceState::DeleteInProgress,
            ResourceState::DeleteFailed,
            ResourceState::DeleteComplete,
        ] {
            assert_eq!(state.as_str().parse::<ResourceState>(), Ok(state));
            assert_eq!(serde_json::to_value(state).unwrap(), json!(state.as_str()));
        }
        assert!("SUSPENDED".parse::<ResourceState>().is_err());
        assert!(ResourceState::CreateFailed.is_terminal());
        assert!(!ResourceState::DeleteInProgress.is_terminal());
    }

    #[test]
    fn test_unknown_state_is_kept_verbatim() {
        let mut resource = Resource::new("r", 1);
        resource.set("state", "SUSPENDED").unwrap();
        assert_eq!(resource.state.as_deref(), Some("SUSPENDED"));
        assert_eq!(resource.resource_state(), None);

        resource.set_state(ResourceState::CreateComplete, Some("done".to_string()));
        assert_eq!(resource.resource_state(), Some(ResourceState::CreateComplete));
        assert_eq!(resource.get("state_description"), Some(FieldValue::from("done")));
    }

    #[test]
    fn test_name_is_required() {
        let mut resource = Resource::new("keep", 1);
        let err = resource.set("name", FieldValue::Null).unwrap_err();
        assert!(matches!(err, FieldError::TypeMismatch { column: "name", .. }));
        assert_eq!(resource.name, "keep");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_stack_is_rejected(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();

        let mut resource = Resource::new("orphan", 12345);
        let err = resource.save(&mut conn).await.unwrap_err();

        match err {
            DbError::ForeignKeyViolation { message, .. } => {
                assert!(message.contains("FOREIGN KEY"), "message was {message}");
            }
            other => panic!("expected a referential integrity error, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_relationships(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let raw = create_test_raw_template(&mut conn, json!({"a": 1})).await;
        let parsed = create_test_parsed_template(&mut conn, json!({"a": 1, "parsed": true}), raw.id().unwrap()).await;
        let stack = create_test_stack(&mut conn, "owner", raw.id().unwrap()).await;

        let mut resource = create_test_resource(&mut conn, "r1", stack.id().unwrap(), parsed.id()).await;
        assert_eq!(resource.stack(&mut conn).await.unwrap().id(), stack.id());
        assert_eq!(
            resource.parsed_template(&mut conn).await.unwrap().and_then(|p| p.id()),
            parsed.id()
        );

        let mut unlinked = create_test_resource(&mut conn, "r2", stack.id().unwrap(), None).await;
        assert!(unlinked.parsed_template(&mut conn).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_removing_parsed_template_unlinks_resource(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let raw = create_test_raw_template(&mut conn, json!({})).await;
        let parsed = create_test_parsed_template(&mut conn, json!({}), raw.id().unwrap()).await;
        let stack = create_test_stack(&mut conn, "keeps-resources", raw.id().unwrap()).await;
        let resource = create_test_resource(&mut conn, "r", stack.id().unwrap(), parsed.id()).await;

        sqlx::query("DELETE FROM parsed_template WHERE id = ?")
            .bind(parsed.id())
            .execute(&mut *conn)
            .await
            .unwrap();

        let stored = Resource::find(&mut conn, resource.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.parsed_template_id, None);
        assert_eq!(stored.stack_id, stack.id().unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_depends_on_is_not_checked(pool: SqlitePool) {
        let mut conn = pool.acquire().await.unwrap();
        let raw = create_test_raw_template(&mut conn, json!({})).await;
        let stack = create_test_stack(&mut conn, "loose", raw.id().unwrap()).await;

        let mut resource = Resource::new("r", stack.id().unwrap());
        resource.set("depends_on", 424242).unwrap();
        resource.save(&mut conn).await.unwrap();

        let stored = Resource::find(&mut conn, resource.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.depends_on, Some(424242));
    }
}
