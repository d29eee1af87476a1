//! Generic entity repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/get/list/update/delete for any type implementing
//!   [`Entity`], driven entirely by its static contract.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths validate against the contract before any SQL mutation.
//! - Every operation runs inside a [`StorageScope`]; a failure leaves no
//!   partial write and list count/page read the same snapshot.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Delete is hard and not idempotent: a missing row is `NotFound`.

use crate::db::migrations::{current_version, latest_version};
use crate::db::StorageScope;
use crate::model::contract::{
    EntityContract, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD, VERSION_FIELD,
};
use crate::model::entity::Entity;
use crate::model::id::EntityId;
use crate::model::record::{Attributes, Record};
use crate::model::update::PartialUpdate;
use crate::model::value::FieldValue;
use crate::query::filter::FilterCriterion;
use crate::query::{ListQuery, ListResult};
use crate::repo::error::{ConflictError, RepoError, RepoResult};
use crate::repo::sql::{classify_write_error, order_clause, placeholders, where_clause, WriteKind};
use log::debug;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::marker::PhantomData;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const WRITE_SCOPE: &str = "repo_write";
const READ_SCOPE: &str = "repo_read";

/// Repository interface for one entity type.
pub trait Repository<E: Entity> {
    /// Connection the repository operates on; services open their own
    /// scopes on it so repository calls join them.
    fn connection(&self) -> &Connection;
    /// Validates `attributes`, assigns a fresh id and stores the entity.
    fn create(&self, attributes: &Attributes) -> RepoResult<E>;
    fn get(&self, id: &EntityId) -> RepoResult<E>;
    /// Filters, then sorts, then pages. Fails with `InvalidQuery` before any
    /// storage access when the query does not fit the contract.
    fn list(&self, query: &ListQuery) -> RepoResult<ListResult<E>>;
    /// Number of rows matching every criterion.
    fn count(&self, filters: &[FilterCriterion]) -> RepoResult<u64>;
    fn exists(&self, id: &EntityId) -> RepoResult<bool>;
    /// Merges the supplied attributes only. An empty update returns the
    /// stored entity unchanged.
    fn update(&self, id: &EntityId, update: &PartialUpdate) -> RepoResult<E>;
    fn delete(&self, id: &EntityId) -> RepoResult<()>;
}

/// SQLite-backed repository for entity type `E`.
pub struct SqliteRepository<'conn, E> {
    conn: &'conn Connection,
    entity: PhantomData<fn() -> E>,
}

impl<'conn, E: Entity> SqliteRepository<'conn, E> {
    /// Constructs a repository from a migrated connection whose schema holds
    /// the contract's table and columns.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, E::contract())?;
        Ok(Self {
            conn,
            entity: PhantomData,
        })
    }

    fn select_sql(contract: &EntityContract) -> String {
        format!(
            "SELECT {} FROM {}",
            contract.columns().join(", "),
            contract.table
        )
    }

    fn fetch_record(&self, id: &EntityId) -> RepoResult<Option<Record>> {
        let contract = E::contract();
        let sql = format!("{} WHERE {ID_FIELD} = ?1;", Self::select_sql(contract));
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(decode_row(contract, row)?));
        }

        Ok(None)
    }

    fn fetch(&self, id: &EntityId) -> RepoResult<Option<E>> {
        match self.fetch_record(id)? {
            Some(record) => Ok(Some(E::from_record(record)?)),
            None => Ok(None),
        }
    }

    fn read_back(&self, id: &EntityId) -> RepoResult<E> {
        self.fetch(id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("row {id} vanished inside its write scope"))
        })
    }
}

impl<E: Entity> Repository<E> for SqliteRepository<'_, E> {
    fn connection(&self) -> &Connection {
        self.conn
    }

    fn create(&self, attributes: &Attributes) -> RepoResult<E> {
        let contract = E::contract();
        let values = contract.validate_new(attributes)?;
        let id = EntityId::generate(contract.id_prefix);
        let now = now_epoch_ms();

        let mut columns = vec![ID_FIELD];
        let mut binds = vec![FieldValue::from(id.clone())];
        for field in contract.fields {
            columns.push(field.name);
            binds.push(values.get(field.name).cloned().unwrap_or(FieldValue::Null));
        }
        if contract.versioned {
            columns.push(VERSION_FIELD);
            binds.push(FieldValue::Integer(1));
        }
        columns.push(CREATED_AT_FIELD);
        binds.push(FieldValue::Integer(now));
        columns.push(UPDATED_AT_FIELD);
        binds.push(FieldValue::Integer(now));

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            contract.table,
            columns.join(", "),
            placeholders(columns.len())
        );

        let scope = StorageScope::begin_write(self.conn, WRITE_SCOPE)?;
        self.conn
            .execute(&sql, params_from_iter(binds.iter()))
            .map_err(|err| {
                classify_write_error(contract, WriteKind::Insert, err, |field| {
                    values.get(field).cloned()
                })
            })?;
        let entity = self.read_back(&id)?;
        scope.commit()?;

        debug!(
            "event=repo_create module=repo status=ok entity={} id={}",
            contract.entity, id
        );
        Ok(entity)
    }

    fn get(&self, id: &EntityId) -> RepoResult<E> {
        self.fetch(id)?
            .ok_or_else(|| RepoError::NotFound(id.clone()))
    }

    fn list(&self, query: &ListQuery) -> RepoResult<ListResult<E>> {
        let started_at = Instant::now();
        let contract = E::contract();
        let query = query.validate(contract)?;
        let filter = where_clause(contract, &query.filters)?;
        let order = order_clause(contract, &query.sort)?;

        let scope = StorageScope::begin(self.conn, READ_SCOPE)?;
        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{};", contract.table, filter.sql),
            params_from_iter(filter.binds.iter()),
            |row| row.get(0),
        )?;

        let mut binds = filter.binds;
        binds.push(FieldValue::Integer(i64::from(query.page.limit())));
        binds.push(FieldValue::Integer(
            i64::try_from(query.page.offset()).unwrap_or(i64::MAX),
        ));
        let sql = format!(
            "{}{} ORDER BY {order} LIMIT ? OFFSET ?;",
            Self::select_sql(contract),
            filter.sql
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds.iter()))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(E::from_record(decode_row(contract, row)?)?);
        }
        drop(rows);
        drop(stmt);
        scope.commit()?;

        debug!(
            "event=repo_list module=repo status=ok entity={} filters={} total={} returned={} duration_ms={}",
            contract.entity,
            query.filters.len(),
            total,
            items.len(),
            started_at.elapsed().as_millis()
        );
        Ok(ListResult {
            items,
            total_count: u64::try_from(total).unwrap_or_default(),
            offset: query.page.offset(),
            limit: query.page.limit(),
        })
    }

    fn count(&self, filters: &[FilterCriterion]) -> RepoResult<u64> {
        let contract = E::contract();
        let filters = filters
            .iter()
            .map(|criterion| criterion.validate(contract))
            .collect::<Result<Vec<_>, _>>()?;
        let filter = where_clause(contract, &filters)?;
        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{};", contract.table, filter.sql),
            params_from_iter(filter.binds.iter()),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    fn exists(&self, id: &EntityId) -> RepoResult<bool> {
        let contract = E::contract();
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {ID_FIELD} = ?1);",
                contract.table
            ),
            [id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn update(&self, id: &EntityId, update: &PartialUpdate) -> RepoResult<E> {
        let contract = E::contract();
        let update = contract.validate_update(update)?;

        let scope = StorageScope::begin_write(self.conn, WRITE_SCOPE)?;
        let current = self
            .fetch_record(id)?
            .ok_or_else(|| RepoError::NotFound(id.clone()))?;

        if let Some(expected) = update.get(VERSION_FIELD).and_then(FieldValue::as_i64) {
            let actual = current.version()?;
            if expected != actual {
                return Err(ConflictError::VersionMismatch {
                    id: id.clone(),
                    expected,
                    actual,
                }
                .into());
            }
        }

        let changes = update
            .iter()
            .filter(|(name, _)| *name != VERSION_FIELD)
            .map(|(name, value)| {
                contract
                    .column(name)
                    .map(|column| (column, value.clone()))
                    .ok_or_else(|| RepoError::InvalidData(format!("unmapped field `{name}`")))
            })
            .collect::<RepoResult<Vec<_>>>()?;
        if changes.is_empty() {
            let entity = E::from_record(current)?;
            scope.commit()?;
            return Ok(entity);
        }

        let field_count = changes.len();
        let mut assignments = changes
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>();
        let mut binds = changes
            .into_iter()
            .map(|(_, value)| value)
            .collect::<Vec<_>>();
        assignments.push(format!("{UPDATED_AT_FIELD} = ?"));
        binds.push(FieldValue::Integer(now_epoch_ms()));
        let mut sql_where = format!("{ID_FIELD} = ?");
        binds.push(FieldValue::from(id.clone()));
        if contract.versioned {
            assignments.push(format!("{VERSION_FIELD} = {VERSION_FIELD} + 1"));
            sql_where.push_str(&format!(" AND {VERSION_FIELD} = ?"));
            binds.push(FieldValue::Integer(current.version()?));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {sql_where};",
            contract.table,
            assignments.join(", ")
        );
        let changed = self
            .conn
            .execute(&sql, params_from_iter(binds.iter()))
            .map_err(|err| {
                classify_write_error(contract, WriteKind::Update, err, |field| {
                    update.get(field).or_else(|| current.get(field)).cloned()
                })
            })?;

        if changed == 0 {
            return Err(match self.fetch_record(id)? {
                None => RepoError::NotFound(id.clone()),
                Some(stored) => ConflictError::VersionMismatch {
                    id: id.clone(),
                    expected: current.version()?,
                    actual: stored.version()?,
                }
                .into(),
            });
        }

        let entity = self.read_back(id)?;
        scope.commit()?;

        debug!(
            "event=repo_update module=repo status=ok entity={} id={} fields={}",
            contract.entity,
            id,
            field_count
        );
        Ok(entity)
    }

    fn delete(&self, id: &EntityId) -> RepoResult<()> {
        let contract = E::contract();
        let scope = StorageScope::begin_write(self.conn, WRITE_SCOPE)?;
        let changed = self
            .conn
            .execute(
                &format!("DELETE FROM {} WHERE {ID_FIELD} = ?1;", contract.table),
                [id.as_str()],
            )
            .map_err(|err| classify_write_error(contract, WriteKind::Delete(id), err, |_| None))?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.clone()));
        }
        scope.commit()?;

        debug!(
            "event=repo_delete module=repo status=ok entity={} id={}",
            contract.entity, id
        );
        Ok(())
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

fn decode_row(contract: &EntityContract, row: &Row<'_>) -> RepoResult<Record> {
    let id: String = row.get(0)?;
    let mut attributes = Attributes::new();
    for (offset, field) in contract.fields.iter().enumerate() {
        let raw = row.get_ref(offset + 1)?;
        let value = field.kind.decode(raw).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "`{}.{}` of {id} is not a valid {}",
                contract.table, field.name, field.kind
            ))
        })?;
        attributes.insert(field.name.to_string(), value);
    }

    let mut index = contract.fields.len() + 1;
    let version = if contract.versioned {
        index += 1;
        Some(row.get::<_, i64>(index - 1)?)
    } else {
        None
    };

    Ok(Record {
        id: EntityId::new(id),
        attributes,
        version,
        created_at: row.get(index)?,
        updated_at: row.get(index + 1)?,
    })
}

fn ensure_connection_ready(conn: &Connection, contract: &'static EntityContract) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, contract.table)? {
        return Err(RepoError::MissingRequiredTable(contract.table));
    }
    let present = table_columns(conn, contract.table)?;
    for column in contract.columns() {
        if !present.iter().any(|name| name == column) {
            return Err(RepoError::MissingRequiredColumn {
                table: contract.table,
                column,
            });
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let found = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1;",
            [table],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    Ok(columns)
}
