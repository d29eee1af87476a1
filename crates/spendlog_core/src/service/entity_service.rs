//! Generic entity service.
//!
//! # Responsibility
//! - Wrap one repository with module hooks: pre-checks, delegation, error
//!   re-classification, post-hooks.
//! - Parse untyped list input and apply module defaults (sort, soft-delete
//!   visibility).
//!
//! # Invariants
//! - Write operations own the outer storage scope; the repository joins it,
//!   so a failing post-hook rolls the write back.
//! - Every error returned belongs to the service taxonomy.
//! - Under a soft-delete policy, flagged rows are invisible to get, update
//!   and delete, and only appear in lists that ask for them.

use crate::db::StorageScope;
use crate::model::contract::ID_FIELD;
use crate::model::entity::Entity;
use crate::model::id::EntityId;
use crate::model::record::Attributes;
use crate::model::update::PartialUpdate;
use crate::model::validation::ValidationError;
use crate::query::builder::{ListQueryBuilder, ListRequest, ParsedList};
use crate::query::filter::FilterCriterion;
use crate::query::error::QueryError;
use crate::query::page::{PageLimits, PageSpec, MAX_PAGE_SIZE};
use crate::query::{ListQuery, ListResult};
use crate::repo::{RepoError, Repository};
use crate::service::error::{ServiceError, ServiceResult};
use crate::service::hooks::{DeletePolicy, HookContext, ServiceHooks};
use log::{debug, info, warn};
use std::marker::PhantomData;
use std::time::Instant;

const SERVICE_SCOPE: &str = "service_op";

/// CRUD service for entity type `E` backed by repository `R`.
pub struct EntityService<E, R, H> {
    repo: R,
    hooks: H,
    limits: PageLimits,
    entity: PhantomData<fn() -> E>,
}

impl<E, R, H> EntityService<E, R, H>
where
    E: Entity,
    R: Repository<E>,
    H: ServiceHooks<E>,
{
    pub fn new(repo: R, hooks: H) -> Self {
        Self {
            repo,
            hooks,
            limits: PageLimits::default(),
            entity: PhantomData,
        }
    }

    /// Overrides the page size policy applied to every list call.
    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn create(&self, attributes: Attributes) -> ServiceResult<E> {
        let started_at = Instant::now();
        let result = self.create_inner(attributes);
        self.observe("create", started_at, result)
    }

    pub fn get(&self, id: &EntityId) -> ServiceResult<E> {
        self.fetch_visible(id)
    }

    /// Lists from query-string style pairs (`name[like]=%a%`, `sort=-name`).
    pub fn list<I, K, V>(&self, pairs: I) -> ServiceResult<ListResult<E>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let parsed = self.builder().from_pairs(pairs)?;
        self.list_parsed(parsed)
    }

    /// Lists from a JSON-shaped request body.
    pub fn list_request(&self, request: &ListRequest) -> ServiceResult<ListResult<E>> {
        let parsed = self.builder().from_request(request)?;
        self.list_parsed(parsed)
    }

    /// Lists from an already-built query.
    ///
    /// The module's default sort applies when `query` names no sort keys.
    /// The page must fit the service's configured maximum.
    pub fn list_query(&self, query: ListQuery, include_deleted: bool) -> ServiceResult<ListResult<E>> {
        let started_at = Instant::now();
        let max = self.limits.max_limit.min(MAX_PAGE_SIZE);
        if query.page.limit() > max {
            return Err(QueryError::PageSizeTooLarge {
                limit: i64::from(query.page.limit()),
                max,
            }
            .into());
        }
        let mut query = query;
        if query.sort.is_empty() {
            query.sort = self.hooks.default_sort();
        }
        if let DeletePolicy::Soft { flag } = self.hooks.delete_policy() {
            if !include_deleted {
                query.filters.push(FilterCriterion::eq(flag, false));
            }
        }

        let result = self.repo.list(&query).map_err(|err| self.classify(err))?;
        debug!(
            "event=entity_list module=service status=ok entity={} total={} returned={} duration_ms={}",
            E::contract().entity,
            result.total_count,
            result.items.len(),
            started_at.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Merges `update` into the visible record `id`.
    pub fn update(&self, id: &EntityId, update: PartialUpdate) -> ServiceResult<E> {
        let started_at = Instant::now();
        let result = self.update_inner(id, update);
        self.observe("update", started_at, result)
    }

    /// Deletes the visible record `id` according to the module's policy.
    ///
    /// Not idempotent: deleting an absent (or already soft-deleted) record
    /// fails with `NotFound`.
    pub fn delete(&self, id: &EntityId) -> ServiceResult<()> {
        let started_at = Instant::now();
        let result = self.delete_inner(id);
        self.observe("delete", started_at, result)
    }

    /// Idempotent delete; returns whether a record was removed.
    pub fn delete_if_exists(&self, id: &EntityId) -> ServiceResult<bool> {
        let started_at = Instant::now();
        let result = match self.delete_inner(id) {
            Ok(()) => Ok(true),
            Err(ServiceError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        };
        self.observe("delete", started_at, result)
    }

    /// Clears the soft-delete flag of `id`. Restoring a visible record
    /// returns it unchanged.
    pub fn restore(&self, id: &EntityId) -> ServiceResult<E> {
        let started_at = Instant::now();
        let result = self.restore_inner(id);
        self.observe("restore", started_at, result)
    }

    fn create_inner(&self, attributes: Attributes) -> ServiceResult<E> {
        let mut attributes = attributes;
        self.reject_flag_write(attributes.keys().map(String::as_str))?;

        let ctx = self.context();
        let scope = StorageScope::begin_write(ctx.connection(), SERVICE_SCOPE)?;
        self.hooks.before_create(&ctx, &mut attributes)?;
        let created = self
            .repo
            .create(&attributes)
            .map_err(|err| self.classify(err))?;
        self.hooks.after_create(&ctx, &created)?;
        scope.commit()?;
        Ok(created)
    }

    fn update_inner(&self, id: &EntityId, update: PartialUpdate) -> ServiceResult<E> {
        let mut update = update;
        self.reject_flag_write(update.iter().map(|(name, _)| name))?;

        let ctx = self.context();
        let scope = StorageScope::begin_write(ctx.connection(), SERVICE_SCOPE)?;
        let current = self.fetch_visible(id)?;
        self.hooks.before_update(&ctx, &current, &mut update)?;
        let updated = self
            .repo
            .update(id, &update)
            .map_err(|err| self.classify(err))?;
        self.hooks.after_update(&ctx, &current, &updated)?;
        scope.commit()?;
        Ok(updated)
    }

    fn delete_inner(&self, id: &EntityId) -> ServiceResult<()> {
        let ctx = self.context();
        let scope = StorageScope::begin_write(ctx.connection(), SERVICE_SCOPE)?;
        let target = self.fetch_visible(id)?;
        self.hooks.before_delete(&ctx, &target)?;
        match self.hooks.delete_policy() {
            DeletePolicy::Hard => self.repo.delete(id).map_err(|err| self.classify(err))?,
            DeletePolicy::Soft { flag } => {
                self.repo
                    .update(id, &PartialUpdate::new().set(flag, true))
                    .map_err(|err| self.classify(err))?;
            }
        }
        self.hooks.after_delete(&ctx, &target)?;
        scope.commit()?;
        Ok(())
    }

    fn restore_inner(&self, id: &EntityId) -> ServiceResult<E> {
        let DeletePolicy::Soft { flag } = self.hooks.delete_policy() else {
            return Err(ValidationError::invalid_value(
                ID_FIELD,
                format!("{} records are not soft-deleted", E::contract().entity),
            )
            .into());
        };

        let ctx = self.context();
        let scope = StorageScope::begin_write(ctx.connection(), SERVICE_SCOPE)?;
        match self.fetch_visible(id) {
            Ok(visible) => {
                scope.commit()?;
                return Ok(visible);
            }
            Err(ServiceError::NotFound { .. }) => {}
            Err(err) => return Err(err),
        }
        let restored = self
            .repo
            .update(id, &PartialUpdate::new().set(flag, false))
            .map_err(|err| self.classify(err))?;
        scope.commit()?;
        Ok(restored)
    }

    fn list_parsed(&self, parsed: ParsedList) -> ServiceResult<ListResult<E>> {
        self.list_query(parsed.query, parsed.include_deleted)
    }

    fn builder(&self) -> ListQueryBuilder<'static> {
        ListQueryBuilder::new(E::contract()).with_limits(self.limits)
    }

    fn context(&self) -> HookContext<'_> {
        HookContext::new(self.repo.connection())
    }

    /// Loads `id` if it is visible under the delete policy.
    fn fetch_visible(&self, id: &EntityId) -> ServiceResult<E> {
        match self.hooks.delete_policy() {
            DeletePolicy::Hard => self.repo.get(id).map_err(|err| self.classify(err)),
            DeletePolicy::Soft { flag } => {
                let query = ListQuery::new()
                    .filter(FilterCriterion::eq(ID_FIELD, id.as_str()))
                    .filter(FilterCriterion::eq(flag, false))
                    .page(PageSpec::new(0, 1)?);
                let mut page = self.repo.list(&query).map_err(|err| self.classify(err))?;
                page.items.pop().ok_or_else(|| ServiceError::NotFound {
                    entity: E::contract().entity,
                    id: id.clone(),
                })
            }
        }
    }

    fn reject_flag_write<'a>(&self, mut names: impl Iterator<Item = &'a str>) -> ServiceResult<()> {
        if let DeletePolicy::Soft { flag } = self.hooks.delete_policy() {
            if names.any(|name| name == flag) {
                return Err(ValidationError::ReadOnlyField(flag.to_string()).into());
            }
        }
        Ok(())
    }

    fn classify(&self, err: RepoError) -> ServiceError {
        match err {
            RepoError::Conflict(conflict) => self.hooks.map_conflict(conflict),
            other => ServiceError::from_repo(E::contract().entity, other),
        }
    }

    fn observe<T>(
        &self,
        op: &'static str,
        started_at: Instant,
        result: ServiceResult<T>,
    ) -> ServiceResult<T> {
        let entity = E::contract().entity;
        let duration_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(_) => info!(
                "event=entity_{op} module=service status=ok entity={entity} duration_ms={duration_ms}"
            ),
            Err(err) => warn!(
                "event=entity_{op} module=service status=error entity={entity} duration_ms={duration_ms} error_code={} error={err}",
                err.code()
            ),
        }
        result
    }
}
