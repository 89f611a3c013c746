//! Persistence gateway: the connection pool and the transactions handed out from it.

use std::str::FromStr;

use sqlx::{
    Sqlite, SqlitePool, Transaction,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::{info, instrument};

use crate::config::DatabaseConfig;
use crate::db::errors::Result;
use crate::db::schema;

/// A unit of work. Statements executed on it become visible to others on `commit()`; dropping it
/// rolls back.
pub type TransactionContext = Transaction<'static, Sqlite>;

/// Owns the connection pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Gateway {
    pool: SqlitePool,
}

impl Gateway {
    /// Open the database described by `config`, run pending migrations and verify the schema.
    ///
    /// Every pooled connection enforces foreign keys. Note that `sqlite::memory:` gives each
    /// connection its own database, so in-memory use needs `max_connections: 1`.
    #[instrument(skip(config), err)]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(config.pool.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.pool.max_connections)
            .min_connections(config.pool.min_connections)
            .acquire_timeout(config.pool.acquire_timeout)
            .connect_with(options)
            .await?;

        let gateway = Self::from_pool(pool);
        gateway.sync().await?;
        Ok(gateway)
    }

    /// Wrap an existing pool. Migrations are not run.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations, then register the schema and check it against the database.
    #[instrument(skip(self), err)]
    pub async fn sync(&self) -> Result<()> {
        crate::migrator().run(&self.pool).await?;

        let mut conn = self.pool.acquire().await?;
        schema::register().verify(&mut conn).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    /// Start a transaction
    pub async fn begin(&self) -> Result<TransactionContext> {
        Ok(self.pool.begin().await?)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolSettings;
    use crate::db::errors::DbError;
    use crate::db::handlers::{Repository, Stacks};
    use crate::db::models::record::Record;
    use crate::db::models::stacks::Stack;
    use crate::test_utils::{create_test_raw_template, create_test_stack};
    use serde_json::json;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            pool: PoolSettings {
                max_connections: 1,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_connect_migrates_and_registers() {
        let gateway = Gateway::connect(&memory_config()).await.unwrap();
        assert!(schema::registered().is_some());

        // Running it again is a no-op
        gateway.sync().await.unwrap();

        let mut tx = gateway.begin().await.unwrap();
        let raw = create_test_raw_template(&mut tx, json!({})).await;
        create_test_stack(&mut tx, "gw", raw.id().unwrap()).await;
        tx.commit().await.unwrap();

        let mut conn = gateway.pool().acquire().await.unwrap();
        assert!(Stacks::new(&mut conn).get_by_name("gw").await.unwrap().is_some());
        drop(conn);
        gateway.close().await;
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let gateway = Gateway::connect(&memory_config()).await.unwrap();

        let raw_id = {
            let mut tx = gateway.begin().await.unwrap();
            let raw = create_test_raw_template(&mut tx, json!({})).await;
            tx.commit().await.unwrap();
            raw.id().unwrap()
        };

        {
            let mut tx = gateway.begin().await.unwrap();
            create_test_stack(&mut tx, "never", raw_id).await;
        }

        let mut conn = gateway.pool().acquire().await.unwrap();
        assert!(Stacks::new(&mut conn).get_by_name("never").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_with_commits() {
        let gateway = Gateway::connect(&memory_config()).await.unwrap();

        let mut tx = gateway.begin().await.unwrap();
        let raw = create_test_raw_template(&mut tx, json!({})).await;
        tx.commit().await.unwrap();

        let mut stack = Stack::new("committed", raw.id().unwrap());
        stack.save_with(&gateway).await.unwrap();

        let mut duplicate = Stack::new("committed", raw.id().unwrap());
        let err = duplicate.save_with(&gateway).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        stack.delete_with(&gateway).await.unwrap();
        let mut conn = gateway.pool().acquire().await.unwrap();
        let stored = Stacks::new(&mut conn).get_by_id(stack.id().unwrap()).await.unwrap().unwrap();
        assert!(stored.is_deleted());
    }
}
