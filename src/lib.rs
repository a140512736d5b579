//! File-backed pizza catalog and order store with periodic order aggregation.
//!
//! The catalog is one JSON array rewritten wholesale on every change. Orders
//! are one JSON document each in an order directory, and a background job
//! merges them into a single aggregate document on a fixed interval.
//!
//! # Examples
//!
//! Synchronous use of [`core::catalog::CatalogStore`] over in-memory storage:
//! ```
//! use std::sync::Arc;
//!
//! use pizzastore::{
//!     core::catalog::CatalogStore,
//!     record::PizzaDraft,
//!     storage::memory::MemoryStorage,
//! };
//!
//! let storage = Arc::new(MemoryStorage::new().with_document("pizza.json", "[]"));
//! let mut catalog = CatalogStore::new(storage, "pizza.json");
//! let created = catalog.create(PizzaDraft {
//!     name: "Margherita".to_string(),
//!     toppings: vec!["tomato".to_string(), "mozzarella".to_string()],
//!     image_url: "margherita.png".to_string(),
//!     status: true,
//! }).expect("create");
//! assert_eq!(created.id, 1);
//! ```
//!
//! Runtime use over a directory:
//! ```no_run
//! use std::sync::Arc;
//!
//! use pizzastore::{
//!     config::PizzeriaConfig,
//!     runtime::handle::spawn_pizzeria,
//!     storage::{Storage, fs::FsStorage},
//! };
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let storage = FsStorage::new("database");
//! storage.create_dir("orders").expect("order dir");
//! let handle = spawn_pizzeria(Arc::new(storage), PizzeriaConfig::default());
//! let order = handle.submit_order(&json!({
//!     "id": "a",
//!     "orderedPizzas": ["Margherita"],
//!     "name": "Alice",
//! })).await.expect("submit");
//! assert_eq!(order.id, "a");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

#![deny(missing_docs)]

/// Runtime configuration.
pub mod config;
/// Catalog store, order ingestion, and merge compaction.
pub mod core;
/// Store error taxonomy.
pub mod error;
/// Pizza and order records.
pub mod record;
/// Async handle, merge scheduler, and events.
pub mod runtime;
/// Pluggable document storage backends.
pub mod storage;
/// Shared primitive types.
pub mod types;
/// Record schema validation.
pub mod validate;
