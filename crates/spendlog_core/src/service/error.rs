//! Service error taxonomy.

use crate::db::DbError;
use crate::model::id::EntityId;
use crate::model::validation::ValidationError;
use crate::query::error::QueryError;
use crate::repo::{ConflictError, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Coarse classification every service error falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    InvalidQuery,
    Storage,
}

#[derive(Debug)]
pub enum ServiceError {
    NotFound {
        entity: &'static str,
        id: EntityId,
    },
    Validation(ValidationError),
    Conflict(ConflictError),
    InvalidQuery(QueryError),
    /// Unique-name conflict re-classified by a module.
    DuplicateName {
        field: String,
        value: String,
    },
    /// Delete refused while other records depend on the target.
    InUse {
        entity: &'static str,
        id: EntityId,
        dependents: u64,
    },
    /// Persistence failure surfaced unchanged.
    Storage(RepoError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) | Self::DuplicateName { .. } | Self::InUse { .. } => {
                ErrorKind::Conflict
            }
            Self::InvalidQuery(_) => ErrorKind::InvalidQuery,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Maps a repository failure, naming `entity` in not-found errors.
    pub fn from_repo(entity: &'static str, err: RepoError) -> Self {
        match err {
            RepoError::NotFound(id) => Self::NotFound { entity, id },
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Conflict(err) => Self::Conflict(err),
            RepoError::InvalidQuery(err) => Self::InvalidQuery(err),
            other => Self::Storage(other),
        }
    }

    /// Stable machine-readable code for logs and callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::InvalidQuery(_) => "invalid_query",
            Self::DuplicateName { .. } => "duplicate_name",
            Self::InUse { .. } => "in_use",
            Self::Storage(_) => "storage",
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Conflict(err) => write!(f, "{err}"),
            Self::InvalidQuery(err) => write!(f, "{err}"),
            Self::DuplicateName { field, value } => {
                write!(f, "{field} `{value}` is already in use")
            }
            Self::InUse {
                entity,
                id,
                dependents,
            } => write!(
                f,
                "{entity} {id} is referenced by {dependents} record(s)"
            ),
            Self::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Conflict(err) => Some(err),
            Self::InvalidQuery(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::NotFound { .. } | Self::DuplicateName { .. } | Self::InUse { .. } => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::from_repo("record", value)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<QueryError> for ServiceError {
    fn from(value: QueryError) -> Self {
        Self::InvalidQuery(value)
    }
}

impl From<DbError> for ServiceError {
    fn from(value: DbError) -> Self {
        Self::Storage(RepoError::Db(value))
    }
}
