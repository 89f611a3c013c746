//! Database record models matching table schemas.
//!
//! Every model embeds a [`record::RecordMeta`] with the columns all tables share (id,
//! timestamps and the soft-delete flag) and implements [`record::Record`] for field access,
//! save and delete.
//!
//! # Models
//!
//! - [`raw_templates`]: templates as submitted by the user
//! - [`parsed_templates`]: their normalized form
//! - [`stacks`]: named instantiations of a template
//! - [`resources`]: the infrastructure elements of a stack
//! - [`events`]: the history of a stack
//!
//! Relationships are loaded on first access and cached on the instance:
//!
//! ```ignore
//! let mut stack = Stack::find(&mut conn, id).await?.ok_or(DbError::NotFound)?;
//! for resource in stack.resources(&mut conn).await? {
//!     println!("{} is {:?}", resource.name, resource.state);
//! }
//! ```

pub mod events;
pub mod parsed_templates;
pub mod raw_templates;
pub mod record;
pub mod resources;
pub mod stacks;
