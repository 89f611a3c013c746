//! Database repository for stack events.

use std::collections::HashMap;

use sqlx::SqliteConnection;
use tracing::instrument;

use crate::db::{
    errors::Result,
    handlers::repository::{ListFilter, Repository, fetch_bulk, fetch_by_id, fetch_list},
    models::events::Event,
};
use crate::types::{EventId, StackId};

pub struct Events<'c> {
    db: &'c mut SqliteConnection,
}

impl<'c> Events<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// The event history of a stack, oldest first
    #[instrument(skip(self), err)]
    pub async fn list_by_stack(&mut self, stack_id: StackId) -> Result<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>("SELECT * FROM event WHERE stack_id = ? ORDER BY created_at, id")
            .bind(stack_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(events)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Events<'c> {
    type Response = Event;
    type Id = EventId;
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
