//! Entity contracts and value model shared by every module.
//!
//! # Responsibility
//! - Describe each storable resource type statically (`EntityContract`).
//! - Carry attribute values, partial updates and decoded records between
//!   services, repositories and storage.
//!
//! # Invariants
//! - Every entity is identified by a stable `EntityId`.
//! - Field names used anywhere in queries or writes must be declared on the
//!   entity's contract; nothing is resolved by runtime attribute lookup.

pub mod category;
pub mod contract;
pub mod entity;
pub mod expense;
pub mod id;
pub mod record;
pub mod update;
pub mod validation;
pub mod value;
