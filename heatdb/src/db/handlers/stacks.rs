//! Database repository for stacks.

use std::collections::HashMap;

use sqlx::{FromRow, Row, SqliteConnection};
use tracing::instrument;

use crate::db::{
    errors::Result,
    handlers::repository::{ListFilter, Repository, fetch_bulk, fetch_by_id, fetch_list},
    models::{record::Record, stacks::Stack},
};
use crate::types::{RawTemplateId, StackId};

/// Extra attribute attached by [`Stacks::list_with_resource_counts`]
pub const RESOURCE_COUNT: &str = "resource_count";

pub struct Stacks<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Stacks<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Look up a live stack by name
    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<Stack>> {
        let stack = sqlx::query_as::<_, Stack>("SELECT * FROM stack WHERE name = ? AND deleted = 0")
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(stack)
    }

    /// The stack instantiated from a raw template, deleted or not
    #[instrument(skip(self), err)]
    pub async fn get_by_raw_template(&mut self, raw_template_id: RawTemplateId) -> Result<Option<Stack>> {
        let stack = sqlx::query_as::<_, Stack>("SELECT * FROM stack WHERE raw_template_id = ? ORDER BY id LIMIT 1")
            .bind(raw_template_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(stack)
    }

    /// List stacks with the number of resources each one owns attached as the
    /// `resource_count` extra attribute.
    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list_with_resource_counts(&mut self, filter: &ListFilter) -> Result<Vec<Stack>> {
        let rows = sqlx::query(
            r#"
            SELECT s.*, (SELECT COUNT(*) FROM resource r WHERE r.stack_id = s.id) AS resource_count
            FROM stack s
            WHERE ? OR s.deleted = 0
            ORDER BY s.created_at, s.id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(filter.include_deleted)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        rows.iter()
            .map(|row| -> Result<Stack> {
                let mut stack = Stack::from_row(row)?;
                let count: i64 = row.try_get(RESOURCE_COUNT)?;
                stack.set(RESOURCE_COUNT, count)?;
                Ok(stack)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Stacks<'c> {
    type Response = Stack;
    type Id = StackId;
    type Filter = ListFilter;

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        fetch_by_id(&mut *self.db, id).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        fetch_bulk(&mut *self.db, &ids).await
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        fetch_list(&mut *self.db, filter).await
    }
}
