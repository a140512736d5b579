//! Runtime configuration.

use std::time::Duration;

use crate::core::catalog::IdPolicy;

/// Storage layout and scheduling knobs for [`crate::runtime::handle::spawn_pizzeria`].
#[derive(Debug, Clone)]
pub struct PizzeriaConfig {
    /// Key of the catalog document.
    pub catalog_key: String,
    /// Directory holding one document per order.
    pub order_dir: String,
    /// Key of the merged order snapshot.
    pub aggregate_key: String,
    /// File extension recognized as an order document, without the dot.
    pub order_extension: String,
    /// Period of the merge job.
    pub merge_interval_ms: u64,
    /// Run one merge immediately when the scheduler starts.
    pub merge_on_start: bool,
    /// Id allocation rule for new catalog entries.
    pub id_policy: IdPolicy,
    /// Capacity of the catalog writer's command queue.
    pub command_queue_bound: usize,
    /// Capacity of the event broadcast buffer; slow subscribers lag past it.
    pub event_queue_bound: usize,
}

impl PizzeriaConfig {
    /// [`Self::merge_interval_ms`] as a [`Duration`].
    pub fn merge_interval(&self) -> Duration {
        Duration::from_millis(self.merge_interval_ms)
    }
}

impl Default for PizzeriaConfig {
    fn default() -> Self {
        Self {
            catalog_key: "pizza.json".to_string(),
            order_dir: "orders".to_string(),
            aggregate_key: "orders.json".to_string(),
            order_extension: "json".to_string(),
            merge_interval_ms: 60_000,
            merge_on_start: true,
            id_policy: IdPolicy::default(),
            command_queue_bound: 256,
            event_queue_bound: 1024,
        }
    }
}
