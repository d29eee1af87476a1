//! Capability trait every storable module type implements.

use crate::model::contract::EntityContract;
use crate::model::id::EntityId;
use crate::model::record::{DecodeError, Record};

/// A storable resource type.
///
/// Repositories and services are written once against this trait and
/// parameterized per module; modules never subclass a base repository.
pub trait Entity: Sized {
    /// Static attribute declaration for this type.
    fn contract() -> &'static EntityContract;

    /// Builds the typed entity from a contract-validated row.
    fn from_record(record: Record) -> Result<Self, DecodeError>;

    fn id(&self) -> &EntityId;
}
