use std::{path::Path, sync::Arc};

use crate::{
    error::{StoreError, StoreResult, encode_json, parse_json},
    record::OrderRecord,
    storage::{Storage, join_key},
    validate::validate_order,
};

/// An order document left out of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedOrder {
    /// Storage key of the skipped document.
    pub key: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Outcome of one merge cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeReport {
    /// Order documents considered (matching extension).
    pub scanned: usize,
    /// Orders written to the aggregate.
    pub merged: usize,
    /// Documents that could not be read or did not validate.
    pub skipped: Vec<SkippedOrder>,
}

/// Rebuilds the order aggregate from the per-order documents.
///
/// A cycle is a full rescan: the aggregate only ever contains what the order
/// directory held at listing time, in listing order. Unreadable documents are
/// logged and skipped; they never fail the cycle.
pub struct MergeCompactor {
    storage: Arc<dyn Storage>,
    order_dir: String,
    aggregate_key: String,
    extension: String,
}

impl MergeCompactor {
    /// Compactor merging `<order_dir>/*.<extension>` into `aggregate_key`.
    pub fn new(
        storage: Arc<dyn Storage>,
        order_dir: impl Into<String>,
        aggregate_key: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            order_dir: order_dir.into(),
            aggregate_key: aggregate_key.into(),
            extension: extension.into(),
        }
    }

    /// Key of the aggregate document.
    pub fn aggregate_key(&self) -> &str {
        &self.aggregate_key
    }

    /// Runs one merge cycle and atomically replaces the aggregate.
    ///
    /// Fails only when the order directory cannot be listed or the aggregate
    /// cannot be written; the previous aggregate is kept in both cases.
    pub fn run_once(&self) -> StoreResult<MergeReport> {
        let names = self.storage.list_entries(&self.order_dir)?;

        let mut report = MergeReport::default();
        let mut merged = Vec::with_capacity(names.len());
        for name in names.iter().filter(|n| self.is_order_document(n)) {
            report.scanned += 1;
            let key = join_key(&self.order_dir, name);
            match self.load_order(&key) {
                Ok(order) => merged.push(order),
                Err(err) => {
                    tracing::warn!(%key, error = %err, "skipping unreadable order document");
                    report.skipped.push(SkippedOrder {
                        key,
                        reason: err.to_string(),
                    });
                }
            }
        }
        report.merged = merged.len();

        let bytes = encode_json(&self.aggregate_key, &merged)?;
        self.storage.write_atomic(&self.aggregate_key, &bytes)?;

        tracing::info!(
            aggregate = %self.aggregate_key,
            merged = report.merged,
            skipped = report.skipped.len(),
            "order aggregate refreshed"
        );
        Ok(report)
    }

    /// Orders as of the last completed cycle.
    pub fn read_aggregate(&self) -> StoreResult<Vec<OrderRecord>> {
        let bytes = self.storage.read(&self.aggregate_key)?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::StorageParse {
            key: self.aggregate_key.clone(),
            source,
        })
    }

    fn is_order_document(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .is_some_and(|ext| ext == self.extension.as_str())
    }

    fn load_order(&self, key: &str) -> StoreResult<OrderRecord> {
        let bytes = self.storage.read(key)?;
        let raw = parse_json(key, &bytes)?;
        Ok(validate_order(&raw)?)
    }
}
