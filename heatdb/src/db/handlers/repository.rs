//! Base repository trait and the generic queries behind it.
//!
//! A repository is the read side of one table. Writes go through
//! [`Record::save`](crate::db::models::record::Record::save) and
//! [`Record::delete`](crate::db::models::record::Record::delete) on the model itself.

use std::collections::HashMap;

use sqlx::SqliteConnection;

use crate::db::errors::Result;
use crate::db::models::record::Record;

/// Base repository trait providing common lookups
#[async_trait::async_trait]
pub trait Repository {
    /// The model type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// The filter type for list operations
    type Filter: Send + Sync;

    /// Get an entity by ID, soft-deleted rows included
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Get lots of entities by their IDs, keyed by ID
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>>;

    /// List entities with filtering and pagination
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;
}

/// Filter shared by the list operations.
#[derive(Debug, Clone)]
pub struct ListFilter {
    pub skip: i64,
    pub limit: i64,
    /// Soft-deleted rows are left out unless set
    pub include_deleted: bool,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 100,
            include_deleted: false,
        }
    }
}

impl ListFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            include_deleted: false,
        }
    }

    pub fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

pub(crate) async fn fetch_by_id<R: Record>(conn: &mut SqliteConnection, id: i64) -> Result<Option<R>> {
    let sql = format!("SELECT * FROM {} WHERE id = ?", R::TABLE.name);
    let record = sqlx::query_as::<_, R>(&sql).bind(id).fetch_optional(&mut *conn).await?;
    Ok(record)
}

pub(crate) async fn fetch_bulk<R: Record>(conn: &mut SqliteConnection, ids: &[i64]) -> Result<HashMap<i64, R>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("SELECT * FROM {} WHERE id IN ({})", R::TABLE.name, placeholders);
    let mut query = sqlx::query_as::<_, R>(&sql);
    for id in ids {
        query = query.bind(*id);
    }

    let records = query.fetch_all(&mut *conn).await?;
    Ok(records
        .into_iter()
        .filter_map(|record| record.id().map(|id| (id, record)))
        .collect())
}

/// Rows of `R`'s table in creation order, paginated.
pub(crate) async fn fetch_list<R: Record>(conn: &mut SqliteConnection, filter: &ListFilter) -> Result<Vec<R>> {
    let sql = format!(
        "SELECT * FROM {} WHERE ? OR deleted = 0 ORDER BY created_at, id LIMIT ? OFFSET ?",
        R::TABLE.name
    );

    let records = sqlx::query_as::<_, R>(&sql)
        .bind(filter.include_deleted)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *conn)
        .await?;
    Ok(records)
}
