//! JSON column codec.
//!
//! Template columns hold structured documents but are stored as plain `TEXT`. [`encode`] and
//! [`decode`] convert between the two representations, and [`JsonColumn`] plugs them into
//! SQLx so that a model field can be bound and fetched directly:
//!
//! ```ignore
//! #[derive(sqlx::FromRow)]
//! struct Row {
//!     template: Option<JsonColumn>,
//! }
//! ```
//!
//! Round-trip law: for every JSON-representable value `v`, `decode(&encode(&v)?)? == v`.

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sqlx::{
    Database, Decode, Encode, Sqlite, Type,
    encode::IsNull,
    error::BoxDynError,
    sqlite::SqliteTypeInfo,
};
use thiserror::Error;

/// A JSON column value could not be converted.
#[derive(Error, Debug)]
pub enum SerializationError {
    /// The value holds something JSON cannot represent (e.g. a map with non-string keys)
    #[error("failed to encode JSON column: {0}")]
    Encode(#[source] serde_json::Error),

    /// The stored text is not valid JSON, or does not fit the requested type
    #[error("failed to decode JSON column: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode a structured value into its stored text form.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, SerializationError> {
    serde_json::to_string(value).map_err(SerializationError::Encode)
}

/// Decode stored text back into a structured value.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, SerializationError> {
    serde_json::from_str(text).map_err(SerializationError::Decode)
}

/// A structured value stored as JSON text.
///
/// Defaults to an untyped [`serde_json::Value`], which is what template columns use.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonColumn<T = serde_json::Value>(pub T);

impl JsonColumn {
    /// Capture any serializable value as an untyped JSON document.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self, SerializationError> {
        serde_json::to_value(value).map(JsonColumn).map_err(SerializationError::Encode)
    }
}

impl<T> JsonColumn<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for JsonColumn<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for JsonColumn<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> From<T> for JsonColumn<T> {
    fn from(value: T) -> Self {
        JsonColumn(value)
    }
}

impl<T> Type<Sqlite> for JsonColumn<T> {
    fn type_info() -> SqliteTypeInfo {
        <str as Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <str as Type<Sqlite>>::compatible(ty)
    }
}

impl<'q, T: Serialize> Encode<'q, Sqlite> for JsonColumn<T> {
    fn encode_by_ref(&self, buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>) -> Result<IsNull, BoxDynError> {
        let text = encode(&self.0)?;
        <String as Encode<'q, Sqlite>>::encode(text, buf)
    }
}

impl<'r, T: DeserializeOwned> Decode<'r, Sqlite> for JsonColumn<T> {
    fn decode(value: <Sqlite as Database>::ValueRef<'r>) -> Result<Self, BoxDynError> {
        let text = <&str as Decode<'r, Sqlite>>::decode(value)?;
        Ok(JsonColumn(decode(text)?))
    }
}
