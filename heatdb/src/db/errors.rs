use crate::db::codec::SerializationError;
use crate::db::models::record::FieldError;
use thiserror::Error;

/// Unified error type for database operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Entity not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// Unique constraint violation (a duplicate entry)
    #[error("Duplicate entry: {message}")]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        /// The column whose uniqueness was violated (if extractable)
        column: Option<String>,
        message: String,
    },

    /// Foreign key constraint violation. The message is the storage engine's own.
    #[error("Foreign key constraint violation: {message}")]
    ForeignKeyViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// A JSON column could not be encoded or decoded
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Mapping-view misuse (wrong value kind, read-only column)
    #[error(transparent)]
    Field(#[from] FieldError),

    /// The live database does not match the registered schema
    #[error("Schema mismatch: table {table} is missing {}", describe_missing(.column))]
    SchemaMismatch { table: String, column: Option<String> },

    /// A registered column exists but its constraints differ from the registry
    #[error("Schema mismatch: {table}.{column} should be {expected}")]
    ConstraintMismatch {
        table: String,
        column: String,
        expected: String,
    },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert from sqlx::Error using proper sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        // Codec failures raised from inside sqlx keep their own type
        let err = match err {
            sqlx::Error::Encode(source) => match source.downcast::<SerializationError>() {
                Ok(codec_err) => return DbError::Serialization(*codec_err),
                Err(source) => sqlx::Error::Encode(source),
            },
            sqlx::Error::ColumnDecode { index, source } => match source.downcast::<SerializationError>() {
                Ok(codec_err) => return DbError::Serialization(*codec_err),
                Err(source) => sqlx::Error::ColumnDecode { index, source },
            },
            other => other,
        };

        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                // Older SQLite builds only report "column x is not unique"
                if db_err.is_unique_violation() || message.ends_with("is not unique") {
                    let target = extract_constraint_target(&message);
                    DbError::UniqueViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table: db_err
                            .table()
                            .map(|s| s.to_string())
                            .or_else(|| target.as_ref().map(|(table, _)| table.clone())),
                        column: target.map(|(_, column)| column),
                        message,
                    }
                } else if db_err.is_foreign_key_violation() {
                    DbError::ForeignKeyViolation {
                        constraint: db_err.constraint().map(|s| s.to_string()),
                        table: db_err.table().map(|s| s.to_string()),
                        message,
                    }
                } else {
                    // All other database errors are non-recoverable - convert to anyhow
                    DbError::Other(anyhow::Error::from(err))
                }
            }
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Other(anyhow::Error::from(err).context("failed to apply migrations"))
    }
}

fn describe_missing(column: &Option<String>) -> String {
    match column {
        Some(column) => format!("column {column}"),
        None => "entirely".to_string(),
    }
}

/// Extract `(table, column)` from a SQLite constraint message.
///
/// SQLite does not expose the table or constraint name through the driver, only the text:
/// "UNIQUE constraint failed: stack.name"
fn extract_constraint_target(message: &str) -> Option<(String, String)> {
    let (_, target) = message.split_once("constraint failed: ")?;
    // Composite constraints list every column; the first one is enough to identify the table
    let first = target.split(',').next()?.trim();
    let (table, column) = first.split_once('.')?;
    Some((table.to_string(), column.to_string()))
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_constraint_target() {
        assert_eq!(
            extract_constraint_target("UNIQUE constraint failed: stack.name"),
            Some(("stack".to_string(), "name".to_string()))
        );
        assert_eq!(
            extract_constraint_target("UNIQUE constraint failed: resource.stack_id, resource.name"),
            Some(("resource".to_string(), "stack_id".to_string()))
        );
        assert_eq!(extract_constraint_target("FOREIGN KEY constraint failed"), None);
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(DbError::from(sqlx::Error::RowNotFound), DbError::NotFound));
    }

    #[test]
    fn test_codec_errors_keep_their_type() {
        let codec_err = crate::db::codec::decode::<serde_json::Value>("{not json").unwrap_err();
        let err = sqlx::Error::ColumnDecode {
            index: "\"template\"".to_string(),
            source: Box::new(codec_err),
        };
        assert!(matches!(DbError::from(err), DbError::Serialization(_)));
    }

    #[test]
    fn test_json_bind_failures_keep_their_type() {
        use crate::db::codec::JsonColumn;
        use std::collections::HashMap;

        let mut value = HashMap::new();
        value.insert((1, 2), "tuple keys have no JSON form");

        let mut query = sqlx::query::<sqlx::Sqlite>("SELECT ?");
        let err = query.try_bind(JsonColumn(value)).map_err(sqlx::Error::Encode).unwrap_err();
        assert!(matches!(
            DbError::from(err),
            DbError::Serialization(SerializationError::Encode(_))
        ));

        // The failed bind leaves the query usable
        query.try_bind(JsonColumn(serde_json::json!({"ok": true}))).unwrap();
    }

    #[test]
    fn test_other_errors_are_not_translated() {
        let err = DbError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DbError::Other(_)));
    }

    #[test]
    fn test_schema_mismatch_message() {
        let err = DbError::SchemaMismatch {
            table: "stack".to_string(),
            column: Some("name".to_string()),
        };
        assert_eq!(err.to_string(), "Schema mismatch: table stack is missing column name");

        let err = DbError::SchemaMismatch {
            table: "event".to_string(),
            column: None,
        };
        assert_eq!(err.to_string(), "Schema mismatch: table event is missing entirely");

        let err = DbError::ConstraintMismatch {
            table: "stack".to_string(),
            column: "name".to_string(),
            expected: "unique".to_string(),
        };
        assert_eq!(err.to_string(), "Schema mismatch: stack.name should be unique");
    }
}
