use std::sync::Arc;

use crate::{
    error::{StoreError, StoreResult, encode_json, parse_json},
    record::{PizzaDraft, PizzaRecord},
    storage::Storage,
    types::PizzaId,
    validate::validate_catalog,
};

/// Rule used to pick the id of a newly created pizza.
#[derive(Debug, Clone, Copy, Default)]
pub enum IdPolicy {
    /// Id of the last stored entry plus one, or `1` for an empty catalog.
    ///
    /// Compatible with existing catalogs, but can repeat an id once the list
    /// is no longer in increasing id order (e.g. after deleting the tail).
    #[default]
    LastPlusOne,
    /// Largest stored id plus one, or `1` for an empty catalog.
    MaxPlusOne,
    /// Caller-provided rule.
    Custom(fn(&[PizzaRecord]) -> PizzaId),
}

impl IdPolicy {
    /// Id for the next entry appended to `records`.
    pub fn next_id(self, records: &[PizzaRecord]) -> PizzaId {
        match self {
            Self::LastPlusOne => last_plus_one(records),
            Self::MaxPlusOne => max_plus_one(records),
            Self::Custom(rule) => rule(records),
        }
    }
}

/// [`IdPolicy::LastPlusOne`] as a plain function.
pub fn last_plus_one(records: &[PizzaRecord]) -> PizzaId {
    records.last().map(|r| r.id.saturating_add(1)).unwrap_or(1)
}

/// [`IdPolicy::MaxPlusOne`] as a plain function.
pub fn max_plus_one(records: &[PizzaRecord]) -> PizzaId {
    records
        .iter()
        .map(|r| r.id)
        .max()
        .map(|id| id.saturating_add(1))
        .unwrap_or(1)
}

/// Whole-document store for the pizza catalog.
///
/// Every mutation reads the full catalog, validates it, applies the change and
/// atomically rewrites the document. Mutators take `&mut self`; callers sharing
/// a store across tasks must serialize access (see [`crate::runtime::handle`]).
pub struct CatalogStore {
    storage: Arc<dyn Storage>,
    key: String,
    policy: IdPolicy,
}

impl CatalogStore {
    /// Store over the document at `key`, allocating ids with [`IdPolicy::default`].
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            policy: IdPolicy::default(),
        }
    }

    /// Replaces the id allocation rule.
    pub fn with_policy(mut self, policy: IdPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Key of the catalog document.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current id allocation rule.
    pub fn policy(&self) -> IdPolicy {
        self.policy
    }

    /// All entries in document order.
    pub fn list(&self) -> StoreResult<Vec<PizzaRecord>> {
        let bytes = self.storage.read(&self.key)?;
        let raw = parse_json(&self.key, &bytes)?;
        Ok(validate_catalog(&raw)?)
    }

    /// First entry with `id`.
    pub fn get(&self, id: PizzaId) -> StoreResult<PizzaRecord> {
        self.list()?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(StoreError::PizzaNotFound(id))
    }

    /// Appends a new entry with an id chosen by the configured [`IdPolicy`].
    pub fn create(&mut self, draft: PizzaDraft) -> StoreResult<PizzaRecord> {
        let mut records = self.load_for_write()?;
        let id = self.policy.next_id(&records);
        let record = draft.into_record(id);
        records.push(record.clone());
        self.write(&records)?;
        Ok(record)
    }

    /// Replaces the fields of every entry with `id`, keeping id and position.
    pub fn update(&mut self, id: PizzaId, draft: PizzaDraft) -> StoreResult<PizzaRecord> {
        let mut records = self.load_for_write()?;
        let mut matched = false;
        for rec in records.iter_mut().filter(|r| r.id == id) {
            *rec = draft.clone().into_record(id);
            matched = true;
        }
        if !matched {
            return Err(StoreError::PizzaNotFound(id));
        }
        self.write(&records)?;
        Ok(draft.into_record(id))
    }

    /// Removes every entry with `id`, preserving the order of the rest.
    ///
    /// Leaves the document untouched and fails with
    /// [`StoreError::PizzaNotFound`] when nothing matched.
    pub fn delete(&mut self, id: PizzaId) -> StoreResult<bool> {
        let records = self.load_for_write()?;
        let before = records.len();
        let kept: Vec<PizzaRecord> = records.into_iter().filter(|r| r.id != id).collect();
        if kept.len() == before {
            return Err(StoreError::PizzaNotFound(id));
        }
        self.write(&kept)?;
        Ok(true)
    }

    /// Overwrites the catalog with `records` as given.
    pub fn replace_all(&mut self, records: &[PizzaRecord]) -> StoreResult<()> {
        self.write(records)
    }

    // A missing document is an empty catalog for writers; `list` still reports it.
    fn load_for_write(&self) -> StoreResult<Vec<PizzaRecord>> {
        match self.list() {
            Err(StoreError::StorageRead(err)) if err.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }

    fn write(&self, records: &[PizzaRecord]) -> StoreResult<()> {
        let bytes = encode_json(&self.key, records)?;
        self.storage.write_atomic(&self.key, &bytes)?;
        tracing::debug!(key = %self.key, records = records.len(), "catalog rewritten");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{error::ErrorKind, storage::memory::MemoryStorage};

    fn draft(name: &str) -> PizzaDraft {
        PizzaDraft {
            name: name.to_string(),
            toppings: vec!["tomato".to_string()],
            image_url: format!("{name}.png"),
            status: true,
        }
    }

    fn seeded(doc: serde_json::Value) -> (Arc<MemoryStorage>, CatalogStore) {
        let storage = Arc::new(MemoryStorage::new().with_document("pizza.json", doc.to_string()));
        let store = CatalogStore::new(storage.clone(), "pizza.json");
        (storage, store)
    }

    fn pizza(id: PizzaId) -> serde_json::Value {
        json!({"id": id, "name": format!("p{id}"), "toppings": [], "imageUrl": "", "status": true})
    }

    #[test]
    fn create_on_empty_catalog_allocates_one() {
        let (_, mut store) = seeded(json!([]));
        assert_eq!(store.create(draft("Margherita")).expect("create").id, 1);
        assert_eq!(store.create(draft("Funghi")).expect("create").id, 2);
    }

    #[test]
    fn create_on_missing_catalog_starts_fresh() {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = CatalogStore::new(storage, "pizza.json");
        assert_eq!(store.list().expect_err("missing").kind(), ErrorKind::StorageRead);
        assert_eq!(store.create(draft("Margherita")).expect("create").id, 1);
        assert_eq!(store.list().expect("list").len(), 1);
    }

    #[test]
    fn last_plus_one_follows_tail_not_max() {
        let (_, mut store) = seeded(json!([pizza(5), pizza(1)]));
        let created = store.create(draft("Diavola")).expect("create");
        assert_eq!(created.id, 2);

        let ids: Vec<_> = store.list().expect("list").iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 1, 2]);
    }

    #[test]
    fn last_plus_one_can_collide_after_tail_delete() {
        let (_, mut store) = seeded(json!([pizza(1), pizza(2), pizza(3)]));
        store.delete(3).expect("delete");
        store.delete(1).expect("delete");
        // tail is now id 2, so the next id is 3 again
        assert_eq!(store.create(draft("a")).expect("create").id, 3);
        let (_, mut store) = seeded(json!([pizza(4), pizza(2)]));
        let _ = store.create(draft("b")).expect("create");
        let _ = store.create(draft("c")).expect("create");
        let ids: Vec<_> = store.list().expect("list").iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 2, 3, 4]);
    }

    #[test]
    fn max_plus_one_policy_is_swappable() {
        let (_, store) = seeded(json!([pizza(5), pizza(1)]));
        let mut store = store.with_policy(IdPolicy::MaxPlusOne);
        assert_eq!(store.create(draft("Diavola")).expect("create").id, 6);

        let (_, store) = seeded(json!([pizza(5)]));
        let mut store = store.with_policy(IdPolicy::Custom(|records| 100 + records.len() as PizzaId));
        assert_eq!(store.create(draft("x")).expect("create").id, 101);
    }

    #[test]
    fn delete_missing_id_leaves_bytes_untouched() {
        let original = "[ {\"id\":1,\"name\":\"Margherita\",\"toppings\":[],\"imageUrl\":\"\",\"status\":true} ]";
        let storage = Arc::new(MemoryStorage::new().with_document("pizza.json", original));
        let mut store = CatalogStore::new(storage.clone(), "pizza.json");

        let err = store.delete(9).expect_err("absent");
        assert!(matches!(err, StoreError::PizzaNotFound(9)));
        assert_eq!(storage.read("pizza.json").expect("read"), original.as_bytes());
    }

    #[test]
    fn update_keeps_position_and_id() {
        let (_, mut store) = seeded(json!([pizza(1), pizza(2), pizza(3)]));
        let updated = store.update(2, draft("Quattro")).expect("update");
        assert_eq!(updated.id, 2);

        let names: Vec<_> = store.list().expect("list").into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["p1", "Quattro", "p3"]);
        assert!(matches!(store.update(7, draft("x")), Err(StoreError::PizzaNotFound(7))));
    }

    #[test]
    fn list_reports_parse_and_schema_failures() {
        let storage = Arc::new(MemoryStorage::new().with_document("pizza.json", "[{"));
        let store = CatalogStore::new(storage, "pizza.json");
        assert_eq!(store.list().expect_err("syntax").kind(), ErrorKind::StorageParse);

        let (_, store) = seeded(json!([{"id": 1, "name": "x"}]));
        let err = store.list().expect_err("schema");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.issues().expect("issues").len(), 3);
    }

    #[test]
    fn mutators_refuse_to_rewrite_an_invalid_catalog() {
        let bad = r#"[{"id":"1"}]"#;
        let storage = Arc::new(MemoryStorage::new().with_document("pizza.json", bad));
        let mut store = CatalogStore::new(storage.clone(), "pizza.json");

        assert_eq!(store.create(draft("x")).expect_err("invalid").kind(), ErrorKind::Validation);
        assert_eq!(store.delete(1).expect_err("invalid").kind(), ErrorKind::Validation);
        assert_eq!(storage.read("pizza.json").expect("read"), bad.as_bytes());
    }
}
