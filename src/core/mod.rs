//! Storage-backed catalog, order, and merge components.

/// Whole-document pizza catalog and id allocation.
pub mod catalog;
/// Periodic order aggregation.
pub mod merge;
/// Per-order document writer.
pub mod orders;
