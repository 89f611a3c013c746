//! Database model for parsed templates.

use sqlx::{FromRow, SqliteConnection};

use crate::db::codec::JsonColumn;
use crate::db::errors::{DbError, Result};
use crate::db::handlers::{RawTemplates, Repository, Resources};
use crate::db::models::raw_templates::RawTemplate;
use crate::db::models::record::{FieldValue, Lazy, Record, RecordMeta};
use crate::db::models::resources::Resource;
use crate::db::schema::{ColumnDef, ColumnKind, OnDelete, TableDef};
use crate::types::RawTemplateId;

/// The normalized form of a raw template.
#[derive(Debug, Clone, Default, FromRow)]
pub struct ParsedTemplate {
    #[sqlx(flatten)]
    pub meta: RecordMeta,
    pub template: Option<JsonColumn>,
    pub raw_template_id: RawTemplateId,
    #[sqlx(skip)]
    raw_template: Lazy<RawTemplate>,
    #[sqlx(skip)]
    resources: Lazy<Vec<Resource>>,
}

impl ParsedTemplate {
    pub fn new(template: serde_json::Value, raw_template_id: RawTemplateId) -> Self {
        Self {
            template: Some(JsonColumn(template)),
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

    /// Resources declared by this template.
    pub async fn resources(&mut self, conn: &mut SqliteConnection) -> Result<&[Resource]> {
        let id = self.id();
        let resources = self
            .resources
            .get_or_try_load(move || async move {
                match id {
                    Some(id) => Resources::new(conn).list_by_parsed_template(id).await,
                    None => Ok(Vec::new()),
                }
            })
            .await?;
        Ok(resources.as_slice())
    }

    pub fn with_raw_template(mut self, raw_template: RawTemplate) -> Self {
        self.raw_template.set(raw_template);
        self
    }

    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources.set(resources);
        self
    }

    pub fn invalidate_relations(&mut self) {
        self.raw_template.invalidate();
        self.resources.invalidate();
    }
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("template", ColumnKind::Json),
    ColumnDef::new("raw_template_id", ColumnKind::Integer)
        .required()
        .references("raw_template", OnDelete::Cascade),
];

impl Record for ParsedTemplate {
    const TABLE: &'static TableDef = &TableDef {
        name: "parsed_template",
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
            "raw_template_id" => Some(self.raw_template_id.into()),
            _ => None,
        }
    }

    fn set_column(&mut self, name: &str, value: FieldValue) {
        match name {
            "template" => self.template = value.into_json().map(JsonColumn),
            "raw_template_id" => {
                if let Some(id) = value.into_i64() {
                    self.raw_template_id = id;
                }
            }
            _ => {}
        }
    }
}
