//! Core domain logic for spendlog.
//! Generic CRUD over SQLite with filter/sort/pagination queries, plus the
//! category and expense modules built on it.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult, StorageScope};
pub use logging::{init_logging, logging_status, LogLevel, LoggingError};
pub use model::category::{Category, CategoryPatch, NewCategory};
pub use model::contract::{EntityContract, FieldDef};
pub use model::entity::Entity;
pub use model::expense::{Expense, ExpensePatch, NewExpense};
pub use model::id::EntityId;
pub use model::record::{Attributes, Record};
pub use model::update::{PartialUpdate, Patch};
pub use model::validation::ValidationError;
pub use model::value::{FieldType, FieldValue};
pub use query::builder::{ListQueryBuilder, ListRequest};
pub use query::error::QueryError;
pub use query::filter::{FilterCriterion, FilterOp, FilterValue};
pub use query::page::{PageLimits, PageSpec, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use query::sort::{SortDirection, SortSpec};
pub use query::{ListQuery, ListResult};
pub use repo::{ConflictError, RepoError, RepoResult, Repository, SqliteRepository};
pub use service::{
    CategoryService, DeletePolicy, EntityService, ErrorKind, ExpenseService, ServiceError,
    ServiceHooks, ServiceResult,
};
