//! Database repository for raw templates.

use std::collections::HashMap;

use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::{
    errors::Result,
    handlers::repository::{ListFilter, Repository, fetch_bulk, fetch_by_id, fetch_list},
    models::raw_templates::RawTemplate,
};
use crate::types::RawTemplateId;

pub struct RawTemplates<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> RawTemplates<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for RawTemplates<'c> {
    type Response = RawTemplate;
    type Id = RawTemplateId;
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
