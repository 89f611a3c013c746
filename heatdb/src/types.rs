//! Common type definitions.
//!
//! Every table uses an integer primary key assigned by the storage engine. The aliases below
//! name which table an id belongs to.

pub type RawTemplateId = i64;
pub type ParsedTemplateId = i64;
pub type StackId = i64;
pub type ResourceId = i64;
pub type EventId = i64;
