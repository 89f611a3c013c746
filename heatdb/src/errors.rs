use crate::db::errors::DbError;
use thiserror::Error as ThisError;

/// Top-level error for the binary and for configuration handling.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid or inconsistent configuration
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config {
            message: err.to_string(),
        }
    }
}

impl Error {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config { .. } => 2,
            Error::Database(DbError::SchemaMismatch { .. } | DbError::ConstraintMismatch { .. }) => 3,
            Error::Database(_) | Error::Other(_) => 1,
        }
    }
}
