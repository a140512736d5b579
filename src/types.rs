//! Shared primitive IDs and record-kind tags.

/// Catalog record identifier.
pub type PizzaId = i64;
/// Caller-supplied order identifier, also the order file stem.
pub type OrderId = String;

/// Kind of record handed to [`crate::validate::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// A single [`crate::record::PizzaRecord`].
    Pizza,
    /// Create/update fields for a pizza, without an id.
    PizzaDraft,
    /// A whole catalog document (array of pizzas).
    Catalog,
    /// A single [`crate::record::OrderRecord`].
    Order,
}
