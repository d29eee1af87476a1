//! Per-module extension points of the generic entity service.

use crate::model::contract::CREATED_AT_FIELD;
use crate::model::entity::Entity;
use crate::model::record::Attributes;
use crate::model::update::PartialUpdate;
use crate::query::sort::SortSpec;
use crate::repo::{ConflictError, SqliteRepository};
use crate::service::error::{ServiceError, ServiceResult};
use rusqlite::Connection;

/// How `delete` removes a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Row is removed from storage.
    Hard,
    /// Boolean attribute `flag` is set; flagged rows behave as absent.
    Soft { flag: &'static str },
}

/// Storage access granted to hooks.
///
/// Hooks run inside the service's storage scope, so anything they read or
/// write through this context commits or rolls back with the operation.
#[derive(Clone, Copy)]
pub struct HookContext<'conn> {
    conn: &'conn Connection,
}

impl<'conn> HookContext<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Repository for a related entity type on the same connection.
    pub fn related<T: Entity>(&self) -> ServiceResult<SqliteRepository<'conn, T>> {
        SqliteRepository::try_new(self.conn).map_err(ServiceError::from)
    }
}

/// Module-specific checks and policies around generic CRUD.
///
/// Every method has a pass-through default; modules override what they need.
pub trait ServiceHooks<E: Entity> {
    /// Ordering applied when a list request names no sort keys.
    fn default_sort(&self) -> SortSpec {
        SortSpec::new().desc(CREATED_AT_FIELD)
    }

    fn delete_policy(&self) -> DeletePolicy {
        DeletePolicy::Hard
    }

    /// May normalize `attributes` or reject the create.
    fn before_create(
        &self,
        _ctx: &HookContext<'_>,
        _attributes: &mut Attributes,
    ) -> ServiceResult<()> {
        Ok(())
    }

    fn after_create(&self, _ctx: &HookContext<'_>, _created: &E) -> ServiceResult<()> {
        Ok(())
    }

    /// May normalize `update` or reject it; `current` is the visible row.
    fn before_update(
        &self,
        _ctx: &HookContext<'_>,
        _current: &E,
        _update: &mut PartialUpdate,
    ) -> ServiceResult<()> {
        Ok(())
    }

    fn after_update(
        &self,
        _ctx: &HookContext<'_>,
        _previous: &E,
        _updated: &E,
    ) -> ServiceResult<()> {
        Ok(())
    }

    fn before_delete(&self, _ctx: &HookContext<'_>, _target: &E) -> ServiceResult<()> {
        Ok(())
    }

    fn after_delete(&self, _ctx: &HookContext<'_>, _deleted: &E) -> ServiceResult<()> {
        Ok(())
    }

    /// Re-classifies a storage conflict for callers.
    fn map_conflict(&self, conflict: ConflictError) -> ServiceError {
        ServiceError::Conflict(conflict)
    }
}

/// Hooks that keep every default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl<E: Entity> ServiceHooks<E> for NoHooks {}
