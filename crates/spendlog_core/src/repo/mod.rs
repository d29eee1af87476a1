//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the generic data access contract shared by every module.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes validate against the entity contract before
//!   persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to storage transport errors.

pub mod entity_repo;
pub mod error;
mod sql;

pub use entity_repo::{Repository, SqliteRepository};
pub use error::{ConflictError, RepoError, RepoResult};
