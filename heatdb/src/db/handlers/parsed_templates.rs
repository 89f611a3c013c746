//! Database repository for parsed templates.

use std::collections::HashMap;

use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::{
    errors::Result,
    handlers::repository::{ListFilter, Repository, fetch_bulk, fetch_by_id, fetch_list},
    models::parsed_templates::ParsedTemplate,
};
use crate::types::{ParsedTemplateId, RawTemplateId};

pub struct ParsedTemplates<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> ParsedTemplates<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// The parsed form of a raw template. The oldest row wins if there are several.
    #[instrument(skip(self), err)]
    pub async fn get_by_raw_template(&mut self, raw_template_id: RawTemplateId) -> Result<Option<ParsedTemplate>> {
        let parsed = sqlx::query_as::<_, ParsedTemplate>(
            "SELECT * FROM parsed_template WHERE raw_template_id = ? ORDER BY id LIMIT 1",
        )
        .bind(raw_template_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(parsed)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for ParsedTemplates<'c> {
    type Response = ParsedTemplate;
    type Id = ParsedTemplateId;
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
