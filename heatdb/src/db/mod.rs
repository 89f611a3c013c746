//! Database layer for templates, stacks, resources and events.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Caller    │  (orchestration engine)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐     ┌──────────────┐
//! │   Models    │ ──→ │ Repositories │  (db::handlers - lookups and listings)
//! └──────┬──────┘     └──────────────┘
//!        │ save / delete
//!        ↓
//! ┌─────────────┐
//! │   Gateway   │  (pool + transactions)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   SQLite    │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`]: the entities and the shared [`models::record::Record`] behaviour
//! - [`handlers`]: repositories for reading rows back
//! - [`gateway`]: connection pool, migrations and transactions
//! - [`schema`]: static table definitions and the schema registry
//! - [`codec`]: JSON column encoding
//! - [`errors`]: database-specific error types
//!
//! # Deletes
//!
//! [`Record::delete`](models::record::Record::delete) is a soft delete: the row is flagged and
//! timestamped but kept. Deleting a stack or a raw template also removes their dependent rows;
//! the storage engine does that through triggers and `ON DELETE CASCADE` foreign keys.
//!
//! # Migrations
//!
//! Migrations live in the `migrations/` directory and are run by
//! [`Gateway::connect`](gateway::Gateway::connect), or directly:
//!
//! ```ignore
//! heatdb::migrator().run(&pool).await?;
//! ```

pub mod codec;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod schema;
