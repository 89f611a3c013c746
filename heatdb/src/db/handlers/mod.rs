//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed SQLx connection (or transaction) and returns the models
//! from [`crate::db::models`]. Writes are not part of the repositories: models save and delete
//! themselves through [`Record`](crate::db::models::record::Record).
//!
//! # Available Repositories
//!
//! - [`RawTemplates`]: templates as submitted
//! - [`ParsedTemplates`]: normalized templates, looked up by raw template
//! - [`Stacks`]: stacks by name or raw template, with resource counts
//! - [`Resources`]: resources by stack, name or parsed template
//! - [`Events`]: stack event history
//!
//! # Common Pattern
//!
//! ```ignore
//! use heatdb::db::handlers::{Repository, Stacks};
//!
//! async fn example(gateway: &heatdb::db::gateway::Gateway) -> heatdb::db::errors::Result<()> {
//!     let mut tx = gateway.begin().await?;
//!
//!     let mut repo = Stacks::new(&mut tx);
//!     if let Some(stack) = repo.get_by_name("wordpress").await? {
//!         println!("{:?}", stack.name);
//!     }
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod events;
pub mod parsed_templates;
pub mod raw_templates;
pub mod repository;
pub mod resources;
pub mod stacks;

pub use events::Events;
pub use parsed_templates::ParsedTemplates;
pub use raw_templates::RawTemplates;
pub use repository::{ListFilter, Repository};
pub use resources::Resources;
pub use stacks::Stacks;
