use std::sync::Arc;

use serde_json::Value;

use crate::{
    error::{StoreError, StoreResult, encode_json, parse_json},
    record::OrderRecord,
    storage::{Storage, join_key},
    validate::{validate_order, validate_order_id},
};

/// Writes one document per order into the order directory.
///
/// Writers for distinct ids never coordinate. Resubmitting an id overwrites
/// the earlier document (last write wins).
pub struct OrderIngestor {
    storage: Arc<dyn Storage>,
    dir: String,
    extension: String,
}

impl OrderIngestor {
    /// Ingestor writing `<dir>/<id>.<extension>` documents.
    pub fn new(storage: Arc<dyn Storage>, dir: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            storage,
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// Order directory.
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// Storage key of the document for order `id`.
    pub fn key_for(&self, id: &str) -> String {
        join_key(&self.dir, &format!("{id}.{}", self.extension))
    }

    /// Validates and persists `record`, returning the key it was written to.
    pub fn submit(&self, record: &OrderRecord) -> StoreResult<String> {
        let raw = serde_json::to_value(record).map_err(|source| StoreError::Encode {
            key: self.dir.clone(),
            source,
        })?;
        self.submit_value(&raw).map(|(_, key)| key)
    }

    /// Validates a raw order document and persists it.
    pub fn submit_value(&self, raw: &Value) -> StoreResult<(OrderRecord, String)> {
        let order = validate_order(raw)?;
        let key = self.key_for(&order.id);
        let bytes = encode_json(&key, &order)?;
        self.storage.write_atomic(&key, &bytes)?;
        tracing::debug!(order = %order.id, %key, "order stored");
        Ok((order, key))
    }

    /// Reads order `id` straight from its document.
    pub fn get(&self, id: &str) -> StoreResult<OrderRecord> {
        validate_order_id(id)?;
        let key = self.key_for(id);
        let bytes = match self.storage.read(&key) {
            Ok(bytes) => bytes,
            Err(err) if err.is_not_found() => return Err(StoreError::OrderNotFound(id.to_string())),
            Err(err) => return Err(err.into()),
        };
        let raw = parse_json(&key, &bytes)?;
        Ok(validate_order(&raw)?)
    }
}
