use std::path::PathBuf;
use thiserror::Error;

use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration source unavailable at {location}: {source}")]
    SourceUnavailable {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write migration {}: {source}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid migration name: {0:?}")]
    InvalidName(String),

    #[error("failed to render migration {identifier}: {source}")]
    Template {
        identifier: String,
        #[source]
        source: TemplateError,
    },

    #[error("migration {identifier} failed: {source}")]
    Execution {
        identifier: String,
        #[source]
        source: sqlx::Error,
    },

    /// The tracking table already holds this identifier. Only happens when
    /// another run applied the script between the check and the insert.
    #[error("migration {identifier} is already recorded as applied")]
    DuplicateRecord { identifier: String },

    #[error("database connection failed: {0}")]
    Connection(#[source] sqlx::Error),
}

impl MigrationError {
    pub(crate) fn execution(identifier: &str, source: sqlx::Error) -> Self {
        MigrationError::Execution {
            identifier: identifier.to_string(),
            source,
        }
    }

    /// Identifier of the script the error belongs to, if any.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            MigrationError::Template { identifier, .. }
            | MigrationError::Execution { identifier, .. }
            | MigrationError::DuplicateRecord { identifier } => Some(identifier),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
