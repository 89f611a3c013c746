//! # heatdb: persistence for the Heat orchestration engine
//!
//! `heatdb` stores the templates users submit, the stacks created from them, the resources each
//! stack provisions and the events that happen along the way. Rows are plain SQLite tables managed
//! through SQLx.
//!
//! ## Overview
//!
//! Callers construct or fetch a model, change it through its fields or the
//! [`Record`](db::models::record::Record) field accessors, and call `save` or `delete` on a
//! transaction from the [`Gateway`](db::gateway::Gateway):
//!
//! ```ignore
//! use heatdb::db::gateway::Gateway;
//! use heatdb::db::models::{raw_templates::RawTemplate, record::Record, stacks::Stack};
//!
//! let gateway = Gateway::connect(&config.database).await?;
//! let mut tx = gateway.begin().await?;
//!
//! let mut raw = RawTemplate::new(serde_json::json!({"Resources": {}}));
//! raw.save(&mut tx).await?;
//!
//! let mut stack = Stack::new("wordpress", raw.id().unwrap());
//! stack.save(&mut tx).await?;
//!
//! tx.commit().await?;
//! ```
//!
//! JSON columns go through [`db::codec`]; a duplicate stack name fails with
//! [`DbError::UniqueViolation`](db::errors::DbError::UniqueViolation).
//!
//! ## Configuration and logging
//!
//! The `heatdb` binary reads [`config::Config`] from YAML and the environment and logs through
//! [`telemetry`].

pub mod config;
pub mod db;
pub mod errors;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test;
#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use db::gateway::{Gateway, TransactionContext};
pub use types::{EventId, ParsedTemplateId, RawTemplateId, ResourceId, StackId};

/// Get the heatdb database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}
