//! Table definitions and the process-wide schema registry.
//!
//! Every model declares its columns as a static [`TableDef`]. The registry collects them once,
//! at startup, through [`register`]. Nothing mutates it afterwards; later calls return the same
//! `&'static Schema`.
//!
//! The DDL itself lives in the migrations. [`Schema::verify`] checks that a migrated database
//! carries every registered table and column with the declared constraints.

use std::sync::OnceLock;

use sqlx::SqliteConnection;
use tracing::{info, instrument};

use crate::db::errors::{DbError, Result};
use crate::db::models::{
    events::Event, parsed_templates::ParsedTemplate, raw_templates::RawTemplate, record::Record, resources::Resource,
    stacks::Stack,
};

/// Storage kind of a column, used to type-check values set through the field accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    Bool,
    Timestamp,
    Json,
}

/// What the storage engine does to a referencing row when the referenced row is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
}

impl OnDelete {
    /// The action as SQLite spells it in `pragma_foreign_key_list`
    pub fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub on_delete: OnDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub unique: bool,
    pub primary_key: bool,
    /// Columns only ever written by the save path itself
    pub read_only: bool,
    /// Written by the save path on update; callers cannot set it
    pub managed: bool,
    pub references: Option<ForeignKey>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
            unique: false,
            primary_key: false,
            read_only: false,
            managed: false,
            references: None,
        }
    }

    pub const fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub const fn managed(mut self) -> Self {
        self.managed = true;
        self
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self.read_only = true;
        self
    }

    pub const fn references(mut self, table: &'static str, on_delete: OnDelete) -> Self {
        self.references = Some(ForeignKey {
            table,
            column: "id",
            on_delete,
        });
        self
    }
}

pub const ID: ColumnDef = ColumnDef::new("id", ColumnKind::Integer).primary_key();
pub const CREATED_AT: ColumnDef = ColumnDef::new("created_at", ColumnKind::Timestamp).required().read_only();
pub const UPDATED_AT: ColumnDef = ColumnDef::new("updated_at", ColumnKind::Timestamp).managed();
pub const DELETED: ColumnDef = ColumnDef::new("deleted", ColumnKind::Bool).required();
pub const DELETED_AT: ColumnDef = ColumnDef::new("deleted_at", ColumnKind::Timestamp);

/// Columns every table carries, in storage order, ahead of the table's own columns.
pub const COMMON_COLUMNS: &[ColumnDef] = &[ID, CREATED_AT, UPDATED_AT, DELETED, DELETED_AT];

#[derive(Debug, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    /// Table-specific columns; the common columns are implied
    pub columns: &'static [ColumnDef],
}

impl TableDef {
    /// Every column, common ones first.
    pub fn all_columns(&self) -> impl Iterator<Item = &'static ColumnDef> + use<> {
        let columns = self.columns;
        COMMON_COLUMNS.iter().chain(columns.iter())
    }

    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.all_columns().find(|column| column.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Whether `name` is one of this table's own (non-common) columns
    pub fn is_own_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }
}

/// The set of registered tables.
#[derive(Debug)]
pub struct Schema {
    tables: Vec<&'static TableDef>,
}

static SCHEMA: OnceLock<Schema> = OnceLock::new();

/// Register every model table. Idempotent; the first call builds the registry.
pub fn register() -> &'static Schema {
    SCHEMA.get_or_init(|| {
        // Parents before children, matching the migration order
        let schema = Schema {
            tables: vec![
                RawTemplate::TABLE,
                ParsedTemplate::TABLE,
                Stack::TABLE,
                Event::TABLE,
                Resource::TABLE,
            ],
        };
        info!(tables = schema.tables.len(), "Schema registered");
        schema
    })
}

/// The registry, if [`register`] has run.
pub fn registered() -> Option<&'static Schema> {
    SCHEMA.get()
}

impl Schema {
    pub fn tables(&self) -> impl Iterator<Item = &'static TableDef> + '_ {
        self.tables.iter().copied()
    }

    pub fn table(&self, name: &str) -> Option<&'static TableDef> {
        self.tables().find(|table| table.name == name)
    }

    /// Check the live database against the registry.
    ///
    /// Every registered table and column must be present. For each column, `NOT NULL`, a
    /// single-column unique index and the foreign key target with its `ON DELETE` action must
    /// also match what the registry declares.
    #[instrument(skip(self, conn), err)]
    pub async fn verify(&self, conn: &mut SqliteConnection) -> Result<()> {
        for table in self.tables() {
            let present: Vec<(String, bool)> = sqlx::query_as("SELECT name, \"notnull\" FROM pragma_table_info(?)")
                .bind(table.name)
                .fetch_all(&mut *conn)
                .await?;

            if present.is_empty() {
                return Err(DbError::SchemaMismatch {
                    table: table.name.to_string(),
                    column: None,
                });
            }

            for column in table.all_columns() {
                let Some((_, not_null)) = present.iter().find(|(name, _)| name == column.name) else {
                    return Err(DbError::SchemaMismatch {
                        table: table.name.to_string(),
                        column: Some(column.name.to_string()),
                    });
                };

                // SQLite reports INTEGER PRIMARY KEY columns as nullable
                if !column.primary_key && *not_null == column.nullable {
                    let expected = if column.nullable { "nullable" } else { "NOT NULL" };
                    return Err(mismatch(table, column, expected.to_string()));
                }

                if column.unique && !has_unique_index(conn, table.name, column.name).await? {
                    return Err(mismatch(table, column, "unique".to_string()));
                }

                if let Some(fk) = column.references {
                    let actual: Option<(String, Option<String>, String)> = sqlx::query_as(
                        "SELECT \"table\", \"to\", on_delete FROM pragma_foreign_key_list(?) WHERE \"from\" = ?",
                    )
                    .bind(table.name)
                    .bind(column.name)
                    .fetch_optional(&mut *conn)
                    .await?;

                    let matches = actual.is_some_and(|(target, to, on_delete)| {
                        target == fk.table
                            && to.as_deref().unwrap_or("id") == fk.column
                            && on_delete == fk.on_delete.as_sql()
                    });
                    if !matches {
                        return Err(mismatch(
                            table,
                            column,
                            format!(
                                "a reference to {}({}) ON DELETE {}",
                                fk.table,
                                fk.column,
                                fk.on_delete.as_sql()
                            ),
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

fn mismatch(table: &TableDef, column: &ColumnDef, expected: String) -> DbError {
    DbError::ConstraintMismatch {
        table: table.name.to_string(),
        column: column.name.to_string(),
        expected,
    }
}

async fn has_unique_index(conn: &mut SqliteConnection, table: &str, column: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_index_list(?) AS il \
         WHERE il.\"unique\" = 1 \
           AND (SELECT COUNT(*) FROM pragma_index_info(il.name)) = 1 \
           AND (SELECT name FROM pragma_index_info(il.name)) = ?",
    )
    .bind(table)
    .bind(column)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count > 0)
}
