//! Behaviour shared by every model: bookkeeping columns, a field-accessor view over the
//! declared columns, and the save/delete path.
//!
//! Models implement [`Record`] by naming their table and exposing their own columns through
//! [`Record::column`] and [`Record::set_column`]. Everything else is provided:
//!
//! ```ignore
//! let mut stack = Stack::new("wordpress", raw_template.id().unwrap());
//! stack.save(&mut tx).await?;
//!
//! stack.set("name", "wordpress-2")?;
//! for (column, value) in stack.fields() {
//!     println!("{column} = {value:?}");
//! }
//! stack.save(&mut tx).await?;
//!
//! stack.delete(&mut tx).await?; // soft delete: sets `deleted` and `deleted_at`
//! ```

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::{
    FromRow, Sqlite, SqliteConnection,
    query::Query,
    sqlite::{SqliteArguments, SqliteRow},
};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::db::codec::JsonColumn;
use crate::db::errors::{DbError, Result};
use crate::db::gateway::Gateway;
use crate::db::handlers::repository;
use crate::db::schema::{ColumnDef, ColumnKind, TableDef};

/// A value read from or written to a column through the field accessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl FieldValue {
    /// The column kind this value fits, `None` for `Null` (which fits any nullable column)
    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            FieldValue::Null => None,
            FieldValue::Bool(_) => Some(ColumnKind::Bool),
            FieldValue::Integer(_) => Some(ColumnKind::Integer),
            FieldValue::Text(_) => Some(ColumnKind::Text),
            FieldValue::Timestamp(_) => Some(ColumnKind::Timestamp),
            FieldValue::Json(_) => Some(ColumnKind::Json),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            FieldValue::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_bool(self) -> Option<bool> {
        self.as_bool()
    }

    pub fn into_i64(self) -> Option<i64> {
        self.as_i64()
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_timestamp(self) -> Option<DateTime<Utc>> {
        self.as_timestamp()
    }

    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            FieldValue::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        FieldValue::Json(value)
    }
}

impl From<JsonColumn> for FieldValue {
    fn from(value: JsonColumn) -> Self {
        FieldValue::Json(value.into_inner())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// Misuse of the field accessors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("{table}.{column} expects a {expected:?} value, got {actual:?}")]
    TypeMismatch {
        table: &'static str,
        column: &'static str,
        expected: ColumnKind,
        actual: Option<ColumnKind>,
    },

    #[error("{table}.{column} is maintained by the save path and cannot be set")]
    ReadOnly { table: &'static str, column: &'static str },
}

fn check_value(table: &'static TableDef, column: &'static ColumnDef, value: &FieldValue) -> std::result::Result<(), FieldError> {
    if column.read_only || column.managed {
        return Err(FieldError::ReadOnly {
            table: table.name,
            column: column.name,
        });
    }

    match value.kind() {
        None if column.nullable => Ok(()),
        Some(kind) if kind == column.kind => Ok(()),
        actual => Err(FieldError::TypeMismatch {
            table: table.name,
            column: column.name,
            expected: column.kind,
            actual,
        }),
    }
}

/// Bookkeeping columns carried by every model, plus the extra attributes attached in memory.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct RecordMeta {
    /// Assigned by the storage engine on first save
    pub id: Option<i64>,
    /// Set on insert, never changed afterwards
    pub created_at: Option<DateTime<Utc>>,
    /// Set on every save after the first
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Values attached by joins or by `set` with an undeclared name. Never persisted.
    #[sqlx(skip)]
    pub extra: BTreeMap<String, FieldValue>,
}

impl RecordMeta {
    fn column(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(self.id.into()),
            "created_at" => Some(self.created_at.into()),
            "updated_at" => Some(self.updated_at.into()),
            "deleted" => Some(self.deleted.into()),
            "deleted_at" => Some(self.deleted_at.into()),
            _ => None,
        }
    }

    /// Only called with values that passed `check_value`
    fn set_column(&mut self, name: &str, value: FieldValue) {
        match name {
            "updated_at" => self.updated_at = value.into_timestamp(),
            "deleted" => self.deleted = value.into_bool().unwrap_or_default(),
            "deleted_at" => self.deleted_at = value.into_timestamp(),
            _ => {}
        }
    }
}

/// A relationship slot that is filled on first access.
///
/// Values are boxed so that models can refer to each other in both directions.
#[derive(Debug, Clone)]
pub struct Lazy<T>(Option<Box<T>>);

impl<T> Default for Lazy<T> {
    fn default() -> Self {
        Lazy(None)
    }
}

impl<T> Lazy<T> {
    /// A slot that already holds its value
    pub fn loaded(value: T) -> Self {
        Lazy(Some(Box::new(value)))
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.0.is_some()
    }

    pub fn set(&mut self, value: T) {
        self.0 = Some(Box::new(value));
    }

    /// Drop the cached value so the next access reloads it
    pub fn invalidate(&mut self) {
        self.0 = None;
    }

    /// Return the cached value, running `load` first if there is none.
    pub async fn get_or_try_load<F, Fut>(&mut self, load: F) -> Result<&T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let value = match self.0.take() {
            Some(value) => value,
            None => Box::new(load().await?),
        };
        Ok(&**self.0.insert(value))
    }
}

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_value(mut query: SqliteQuery<'_>, value: FieldValue) -> Result<SqliteQuery<'_>> {
    Ok(match value {
        FieldValue::Null => query.bind(None::<String>),
        FieldValue::Bool(value) => query.bind(value),
        FieldValue::Integer(value) => query.bind(value),
        FieldValue::Text(value) => query.bind(value),
        // Fixed-width text keeps stored timestamps ordered lexically
        FieldValue::Timestamp(value) => query.bind(value.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        // `bind` flattens encode failures into text; `try_bind` keeps the codec error
        FieldValue::Json(value) => {
            query.try_bind(JsonColumn(value)).map_err(sqlx::Error::Encode)?;
            query
        }
    })
}

/// Base behaviour of every model.
#[async_trait::async_trait]
pub trait Record: for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + Sized {
    /// The table this model is stored in
    const TABLE: &'static TableDef;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Current value of one of the model's own columns (not the common ones).
    fn column(&self, name: &str) -> Option<FieldValue>;

    /// Assign one of the model's own columns. Only called with values that match the column
    /// definition.
    fn set_column(&mut self, name: &str, value: FieldValue);

    fn id(&self) -> Option<i64> {
        self.meta().id
    }

    fn is_persisted(&self) -> bool {
        self.meta().id.is_some()
    }

    fn is_deleted(&self) -> bool {
        self.meta().deleted
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.meta().created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.meta().updated_at
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.meta().deleted_at
    }

    /// Value of a declared column, or of an extra attribute.
    fn get(&self, name: &str) -> Option<FieldValue> {
        if let Some(value) = self.meta().column(name) {
            return Some(value);
        }
        if Self::TABLE.is_own_column(name) {
            return self.column(name);
        }
        self.meta().extra.get(name).cloned()
    }

    fn get_or(&self, name: &str, default: FieldValue) -> FieldValue {
        self.get(name).unwrap_or(default)
    }

    /// Assign a declared column, or attach an extra attribute when `name` is not a column.
    fn set<V: Into<FieldValue>>(&mut self, name: &str, value: V) -> std::result::Result<(), FieldError> {
        let value = value.into();
        let Some(column) = Self::TABLE.column(name) else {
            self.meta_mut().extra.insert(name.to_string(), value);
            return Ok(());
        };

        check_value(Self::TABLE, column, &value)?;
        if Self::TABLE.is_own_column(name) {
            self.set_column(name, value);
        } else {
            self.meta_mut().set_column(name, value);
        }
        Ok(())
    }

    /// Apply every pair as a `set`, stopping at the first failure.
    fn update<I, K>(&mut self, values: I) -> std::result::Result<(), FieldError>
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: AsRef<str>,
    {
        for (name, value) in values {
            self.set(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// The declared columns with their current values, in storage order.
    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        Self::TABLE
            .all_columns()
            .map(|column| (column.name, self.get(column.name).unwrap_or(FieldValue::Null)))
            .collect()
    }

    /// The declared columns plus any extra attributes attached to this instance.
    fn fields_with_extra(&self) -> BTreeMap<String, FieldValue> {
        let mut fields: BTreeMap<String, FieldValue> = self
            .meta()
            .extra
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        fields.extend(self.fields().into_iter().map(|(name, value)| (name.to_string(), value)));
        fields
    }

    /// Load a row of this model's table by id, soft-deleted rows included.
    async fn find(conn: &mut SqliteConnection, id: i64) -> Result<Option<Self>> {
        repository::fetch_by_id(conn, id).await
    }

    /// Insert this record, or write back its columns if it was already saved.
    ///
    /// A duplicate value in a unique column fails with [`DbError::UniqueViolation`]; every other
    /// storage failure is returned unchanged.
    #[instrument(skip_all, fields(table = Self::TABLE.name), err)]
    async fn save(&mut self, conn: &mut SqliteConnection) -> Result<()> {
        let now = Utc::now();
        let table = Self::TABLE;

        match self.id() {
            None => {
                let columns: Vec<&'static ColumnDef> = table.all_columns().filter(|c| !c.primary_key).collect();
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table.name,
                    columns.iter().map(|c| c.name).collect::<Vec<_>>().join(", "),
                    vec!["?"; columns.len()].join(", ")
                );

                let mut query = sqlx::query(&sql);
                for column in &columns {
                    let value = match column.name {
                        "created_at" => FieldValue::Timestamp(now),
                        "updated_at" => FieldValue::Null,
                        name => self.get(name).unwrap_or(FieldValue::Null),
                    };
                    query = bind_value(query, value)?;
                }

                let result = query.execute(&mut *conn).await?;
                let meta = self.meta_mut();
                meta.id = Some(result.last_insert_rowid());
                meta.created_at = Some(now);
                meta.updated_at = None;
                debug!(id = result.last_insert_rowid(), "Inserted {}", table.name);
            }
            Some(id) => {
                // Never move updated_at backwards, even if the clock does
                let updated_at = match self.updated_at() {
                    Some(previous) if previous > now => previous,
                    _ => now,
                };

                let columns: Vec<&'static ColumnDef> = table.all_columns().filter(|c| !c.read_only).collect();
                let assignments = columns.iter().map(|c| format!("{} = ?", c.name)).collect::<Vec<_>>();
                let sql = format!("UPDATE {} SET {} WHERE id = ?", table.name, assignments.join(", "));

                let mut query = sqlx::query(&sql);
                for column in &columns {
                    let value = match column.name {
                        "updated_at" => FieldValue::Timestamp(updated_at),
                        name => self.get(name).unwrap_or(FieldValue::Null),
                    };
                    query = bind_value(query, value)?;
                }

                let result = query.bind(id).execute(&mut *conn).await?;
                // The row may have been removed underneath us by a cascade
                if result.rows_affected() == 0 {
                    return Err(DbError::NotFound);
                }
                self.meta_mut().updated_at = Some(updated_at);
            }
        }

        Ok(())
    }

    /// Save using a transaction from the gateway, committing it on success.
    async fn save_with(&mut self, gateway: &Gateway) -> Result<()> {
        let mut tx = gateway.begin().await?;
        self.save(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Soft delete: flag the row and stamp `deleted_at`, then save.
    ///
    /// The row itself stays; dependent rows are removed by the storage engine.
    #[instrument(skip_all, fields(table = Self::TABLE.name), err)]
    async fn delete(&mut self, conn: &mut SqliteConnection) -> Result<()> {
        let previous = (self.meta().deleted, self.meta().deleted_at);

        let meta = self.meta_mut();
        meta.deleted = true;
        meta.deleted_at = Some(Utc::now());

        if let Err(e) = self.save(conn).await {
            let meta = self.meta_mut();
            (meta.deleted, meta.deleted_at) = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Soft delete using a transaction from the gateway, committing it on success.
    async fn delete_with(&mut self, gateway: &Gateway) -> Result<()> {
        let mut tx = gateway.begin().await?;
        self.delete(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
