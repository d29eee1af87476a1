//! Repository error taxonomy.

use crate::db::DbError;
use crate::model::id::EntityId;
use crate::model::record::DecodeError;
use crate::model::validation::ValidationError;
use crate::model::value::FieldValue;
use crate::query::error::QueryError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Write rejected because it collides with stored state.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictError {
    /// Value already taken by another row.
    Unique {
        field: String,
        value: Option<FieldValue>,
    },
    /// Compare-and-swap token does not match the stored version.
    VersionMismatch {
        id: EntityId,
        expected: i64,
        actual: i64,
    },
    /// Row is still referenced by rows of another table.
    Referenced { id: EntityId },
}

impl Display for ConflictError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unique {
                field,
                value: Some(value),
            } => write!(f, "`{field}` value `{value}` already exists"),
            Self::Unique { field, value: None } => write!(f, "`{field}` value already exists"),
            Self::VersionMismatch {
                id,
                expected,
                actual,
            } => write!(
                f,
                "version mismatch for {id}: expected {expected}, stored {actual}"
            ),
            Self::Referenced { id } => write!(f, "{id} is still referenced"),
        }
    }
}

impl Error for ConflictError {}

/// Generic repository error for entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    NotFound(EntityId),
    Validation(ValidationError),
    Conflict(ConflictError),
    InvalidQuery(QueryError),
    Db(DbError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Conflict(err) => write!(f, "{err}"),
            Self::InvalidQuery(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Conflict(err) => Some(err),
            Self::InvalidQuery(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_)
            | Self::InvalidData(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ConflictError> for RepoError {
    fn from(value: ConflictError) -> Self {
        Self::Conflict(value)
    }
}

impl From<QueryError> for RepoError {
    fn from(value: QueryError) -> Self {
        Self::InvalidQuery(value)
    }
}

impl From<DecodeError> for RepoError {
    fn from(value: DecodeError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
