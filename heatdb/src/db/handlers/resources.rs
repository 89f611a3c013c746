//! Database repository for resources.

use std::collections::HashMap;

use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::{
    errors::Result,
    handlers::repository::{ListFilter, Repository, fetch_bulk, fetch_by_id, fetch_list},
    models::resources::Resource,
};
use crate::types::{ParsedTemplateId, ResourceId, StackId};

pub struct Resources<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Resources<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Every resource of a stack, in creation order
    #[instrument(skip(self), err)]
    pub async fn list_by_stack(&mut self, stack_id: StackId) -> Result<Vec<Resource>> {
        let resources = sqlx::query_as::<_, Resource>("SELECT * FROM resource WHERE stack_id = ? ORDER BY created_at, id")
            .bind(stack_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(resources)
    }

    #[instrument(skip(self), err)]
    pub async fn list_by_parsed_template(&mut self, parsed_template_id: ParsedTemplateId) -> Result<Vec<Resource>> {
        let resources =
            sqlx::query_as::<_, Resource>("SELECT * FROM resource WHERE parsed_template_id = ? ORDER BY created_at, id")
                .bind(parsed_template_id)
                .fetch_all(&mut *self.db)
                .await?;

        Ok(resources)
    }

    /// Look up a resource by its name within a stack
    #[instrument(skip(self), err)]
    pub async fn get_by_name_and_stack(&mut self, name: &str, stack_id: StackId) -> Result<Option<Resource>> {
        let resource =
            sqlx::query_as::<_, Resource>("SELECT * FROM resource WHERE name = ? AND stack_id = ? ORDER BY id LIMIT 1")
                .bind(name)
                .bind(stack_id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(resource)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Resources<'c> {
    type Response = Resource;
    type Id = ResourceId;
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
