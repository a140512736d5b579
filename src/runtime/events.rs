//! Runtime event stream payloads.

use crate::types::{OrderId, PizzaId};

/// Events emitted by the catalog writer, the order path, and the merge scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PizzeriaEvent {
    /// A catalog entry was appended.
    PizzaCreated {
        /// Allocated id.
        id: PizzaId,
    },
    /// Catalog entries were rewritten in place.
    PizzaUpdated {
        /// Updated id.
        id: PizzaId,
    },
    /// Catalog entries were removed.
    PizzaDeleted {
        /// Removed id.
        id: PizzaId,
    },
    /// The whole catalog was overwritten.
    CatalogReplaced {
        /// Entries in the new catalog.
        len: usize,
    },
    /// An order document was written.
    OrderSubmitted {
        /// Order id.
        id: OrderId,
    },
    /// A merge cycle replaced the aggregate.
    AggregateRefreshed {
        /// Orders in the new aggregate.
        orders: usize,
        /// Order documents skipped in this cycle.
        skipped: usize,
    },
}
