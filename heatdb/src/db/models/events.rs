//! Database model for stack events.

use sqlx::{FromRow, SqliteConnection};

use crate::db::errors::{DbError, Result};
use crate::db::handlers::{Repository, Stacks};
use crate::db::models::record::{FieldValue, Lazy, Record, RecordMeta};
use crate::db::models::stacks::Stack;
use crate::db::schema::{ColumnDef, ColumnKind, OnDelete, TableDef};
use crate::types::StackId;

/// Something that happened to a stack.
#[derive(Debug, Clone, Default, FromRow)]
pub struct Event {
    #[sqlx(flatten)]
    pub meta: RecordMeta,
    pub stack_id: StackId,
    pub name: Option<String>,
    #[sqlx(skip)]
    stack: Lazy<Stack>,
}

impl Event {
    pub fn new(name: impl Into<String>, stack_id: StackId) -> Self {
        Self {
            name: Some(name.into()),
            stack_id,
            ..Default::default()
        }
    }

    pub async fn stack(&mut self, conn: &mut SqliteConnection) -> Result<&Stack> {
        let id = self.stack_id;
        self.stack
            .get_or_try_load(move || async move { Stacks::new(conn).get_by_id(id).await?.ok_or(DbError::NotFound) })
            .await
    }

    pub fn with_stack(mut self, stack: Stack) -> Self {
        self.stack.set(stack);
        self
    }

    pub fn invalidate_relations(&mut self) {
        self.stack.invalidate();
    }
}

const COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("stack_id", ColumnKind::Integer)
        .required()
        .references("stack", OnDelete::Cascade),
    ColumnDef::new("name", ColumnKind::Text),
];

impl Record for Event {
    const TABLE: &'static TableDef = &TableDef {
        name: "event",
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
            "stack_id" => Some(self.stack_id.into()),
            "name" => Some(self.name.clone().into()),
            _ => None,
        }
    }

    fn set_column(&mut self, name: &str, value: FieldValue) {
        match name {
            "stack_id" => {
                if let Some(id) = value.into_i64() {
                    self.stack_id = id;
                }
            }
            "name" => self.name = value.into_text(),
            _ => {}
        }
    }
}
