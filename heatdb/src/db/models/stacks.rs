//! Database model for stacks.

use sqlx::{FromRow, SqliteConnection};

use crate::db::errors::{DbError, Result};
use crate::db::handlers::{Events, RawTemplates, Repository, Resources};
use crate::db::models::events::Event;
use crate::db::models::raw_templates::RawTemplate;
use crate::db::models::record::{FieldValue, Lazy, Record, RecordMeta};
use crate::db::models::resources::Resource;
use crate::db::schema::{ColumnDef, ColumnKind, OnDelete, TableDef};
use crate::types::RawTemplateId;

/// A named instantiation of a template, as created by the engine.
///
/// Names are unique across every stored row, soft-deleted ones included.
#[derive(Debug, Clone, Default, FromRow)]
pub struct Stack {
    #[sqlx(flatten)]
    pub meta: RecordMeta,
    pub name: Option<String>,
    pub raw_template_id: RawTemplateId,
    #[sqlx(skip)]
    raw_template: Lazy<RawTemplate>,
    #[sqlx(skip)]
    resources: Lazy<Vec<Resource>>,
    #[sqlx(skip)]
    events: Lazy<Vec<Event>>,
}

impl Stack {
    pub fn new(name: impl Into<String>, raw_template_id: RawTemplateId) -> Self {
        Self {
            name: Some(name.into()),
            raw_template_id,
            ..Default::default()
        }
    }

    pub async fn raw_template(&mut self, conn: &mut SqliteConnection) -> Result<&RawTemplate> {
        let id = self.raw_template_id;
        self.raw_template
            .get_or_try_load(move || async move { RawTemplates::new(conn).get_by_id(id).await?.ok_or(DbError::NotFound) })
            .await
    }

    /// Resources provisioned for this stack, loaded on first access.
    pub async fn resources(&mut self, conn: &mut SqliteConnection) -> Result<&[Resource]> {
        let id = self.id();
        let resources = self
            .resources
            .get_or_try_load(move || async move {
                match id {
                    Some(id) => Resources::new(conn).list_by_stack(id).await,
                    None => Ok(Vec::new()),
                }
            })
            .await?;
        Ok(resources.as_slice())
    }

    /// The stack's event history, oldest first, loaded on first access.
    pub async fn events(&mut self, conn: &mut SqliteConnection) -> Result<&[Event]> {
        let id = self.id();
        let events = self
            .events
            .get_or_try_load(move || async move {
                match id {
                    Some(id) => Events::new(conn).list_by_stack(id).await,
                    None => Ok(Vec::new()),
                }
            })
            .await?;
        Ok(events.as_slice())
    }

    pub fn with_raw_template(mut self, raw_template: RawTemplate) -> Self {
        self.raw_template.set(raw_template);
        self
    }

    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources.set(resources);
        self
    }

    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events.set(events);
        self
    }

    pub fn invalidate_relations(&mut self) {
        self.raw_template.invalidate();
        self.resources.invalidate();
        self.events.invalidate();
    }
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("name", ColumnKind::Text).unique(),
    ColumnDef::new("raw_template_id", ColumnKind::Integer)
        .required()
        .references("raw_template", OnDelete::Cascade),
];

impl Record for Stack {
    const TABLE: &'static TableDef = &TableDef {
        name: "stack",
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
            "name" => Some(self.name.clone().into()),
            "raw_template_id" => Some(self.raw_template_id.into()),
            _ => None,
        }
    }

    fn set_column(&mut self, name: &str, value: FieldValue) {
        match name {
            "name" => self.name = value.into_text(),
            "raw_template_id" => {
                if let Some(id) = value.into_i64() {
                    self.raw_template_id = id;
                }
            }
            _ => {}
        }
    }
}
