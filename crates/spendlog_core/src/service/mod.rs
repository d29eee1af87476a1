//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Host module rules (normalization, references, delete policy) as hooks
//!   around one generic service.
//!
//! # Invariants
//! - Every error crossing this boundary is a `ServiceError`.

pub mod category_service;
pub mod entity_service;
pub mod error;
pub mod expense_service;
pub mod hooks;

pub use category_service::{CategoryHooks, CategoryService};
pub use entity_service::EntityService;
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use expense_service::{ExpenseHooks, ExpenseService};
pub use hooks::{DeletePolicy, HookContext, NoHooks, ServiceHooks};
