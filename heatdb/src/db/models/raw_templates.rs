//! Database model for unparsed templates.

use serde::Serialize;
use sqlx::{FromRow, SqliteConnection};

use crate::db::codec::{JsonColumn, SerializationError};
use crate::db::errors::Result;
use crate::db::handlers::{ParsedTemplates, Stacks};
use crate::db::models::parsed_templates::ParsedTemplate;
use crate::db::models::record::{FieldValue, Lazy, Record, RecordMeta};
use crate::db::models::stacks::Stack;
use crate::db::schema::{ColumnDef, ColumnKind, TableDef};

/// Declarative input describing the desired infrastructure, as submitted.
#[derive(Debug, Clone, Default, FromRow)]
pub struct RawTemplate {
    #[sqlx(flatten)]
    pub meta: RecordMeta,
    pub template: Option<JsonColumn>,
    #[sqlx(skip)]
    parsed_template: Lazy<Option<ParsedTemplate>>,
    #[sqlx(skip)]
    stack: Lazy<Option<Stack>>,
}

impl RawTemplate {
    pub fn new(template: serde_json::Value) -> Self {
        Self {
            template: Some(JsonColumn(template)),
            ..Default::default()
        }
    }

    /// Build from any serializable document.
    pub fn from_serializable<T: Serialize + ?Sized>(template: &T) -> std::result::Result<Self, SerializationError> {
        Ok(Self {
            template: Some(JsonColumn::from_serializable(template)?),
            ..Default::default()
        })
    }

    /// The parsed form of this template, loaded on first access.
    pub async fn parsed_template(&mut self, conn: &mut SqliteConnection) -> Result<Option<&ParsedTemplate>> {
        let Some(id) = self.id() else {
            return Ok(None);
        };
        let parsed = self
            .parsed_template
            .get_or_try_load(move || async move { ParsedTemplates::new(conn).get_by_raw_template(id).await })
            .await?;
        Ok(parsed.as_ref())
    }

    /// The stack instantiated from this template, loaded on first access.
    pub async fn stack(&mut self, conn: &mut SqliteConnection) -> Result<Option<&Stack>> {
        let Some(id) = self.id() else {
            return Ok(None);
        };
        let stack = self
            .stack
            .get_or_try_load(move || async move { Stacks::new(conn).get_by_raw_template(id).await })
            .await?;
        Ok(stack.as_ref())
    }

    /// Attach an already loaded parsed template, skipping the lazy load
    pub fn with_parsed_template(mut self, parsed: Option<ParsedTemplate>) -> Self {
        self.parsed_template.set(parsed);
        self
    }

    /// Attach an already loaded stack, skipping the lazy load
    pub fn with_stack(mut self, stack: Option<Stack>) -> Self {
        self.stack.set(stack);
        self
    }

    /// Forget loaded relationships
    pub fn invalidate_relations(&mut self) {
        self.parsed_template.invalidate();
        self.stack.invalidate();
    }
}

const COLUMNS: &[ColumnDef] = &[ColumnDef::new("template", ColumnKind::Json)];

impl Record for RawTemplate {
    const TABLE: &'static TableDef = &TableDef {
        name: "raw_template",
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
            "template" => Some(self.template.clone().into()),
            _ => None,
        }
    }

    fn set_column(&mut self, name: &str, value: FieldValue) {
        if name == "template" {
            self.template = value.into_json().map(JsonColumn);
        }
    }
}
