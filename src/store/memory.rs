//! In-memory document store for single-instance deployments and tests.
//!
//! Each collection is one DashMap entry; every operation runs under that
//! entry's shard lock, which gives single-document mutation atomicity.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{compare_values, Collection, DocumentStore, Filter, Sort, StoreResult};

#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<Collection, Vec<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: Collection, doc: Value) -> StoreResult<()> {
        self.collections.entry(collection).or_default().push(doc);
        Ok(())
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Value>> {
        Ok(self
            .collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned()))
    }

    async fn find_many(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: Option<&Sort>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<Value>> {
        let mut results: Vec<Value> = self
            .collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default();

        if let Some(sort) = sort {
            results.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(&sort.field).unwrap_or(&Value::Null),
                    b.get(&sort.field).unwrap_or(&Value::Null),
                );
                if sort.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        if let Some(limit) = limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn set_fields(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: Value,
    ) -> StoreResult<u64> {
        let mut touched = 0;
        if let Some(mut docs) = self.collections.get_mut(&collection) {
            for doc in docs.iter_mut().filter(|d| filter.matches(d)) {
                if let (Some(obj), Some(updates)) = (doc.as_object_mut(), fields.as_object()) {
                    for (k, v) in updates {
                        obj.insert(k.clone(), v.clone());
                    }
                    touched += 1;
                }
            }
        }
        Ok(touched)
    }

    async fn add_to_set(
        &self,
        collection: Collection,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<u64> {
        let mut touched = 0;
        if let Some(mut docs) = self.collections.get_mut(&collection) {
            for doc in docs.iter_mut().filter(|d| filter.matches(d)) {
                if let Some(obj) = doc.as_object_mut() {
                    let arr = obj
                        .entry(field.to_string())
                        .or_insert_with(|| Value::Array(vec![]));
                    if let Some(arr) = arr.as_array_mut() {
                        if !arr.contains(&value) {
                            arr.push(value.clone());
                        }
                        touched += 1;
                    }
                }
            }
        }
        Ok(touched)
    }

    async fn pull(
        &self,
        collection: Collection,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<u64> {
        let mut touched = 0;
        if let Some(mut docs) = self.collections.get_mut(&collection) {
            for doc in docs.iter_mut().filter(|d| filter.matches(d)) {
                if let Some(arr) = doc.get_mut(field).and_then(Value::as_array_mut) {
                    arr.retain(|v| v != &value);
                    touched += 1;
                }
            }
        }
        Ok(touched)
    }

    async fn push(
        &self,
        collection: Collection,
        filter: &Filter,
        field: &str,
        value: Value,
    ) -> StoreResult<u64> {
        let mut touched = 0;
        if let Some(mut docs) = self.collections.get_mut(&collection) {
            for doc in docs.iter_mut().filter(|d| filter.matches(d)) {
                if let Some(obj) = doc.as_object_mut() {
                    let arr = obj
                        .entry(field.to_string())
                        .or_insert_with(|| Value::Array(vec![]));
                    if let Some(arr) = arr.as_array_mut() {
                        arr.push(value.clone());
                        touched += 1;
                    }
                }
            }
        }
        Ok(touched)
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        Ok(self
            .collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).count() as u64)
            .unwrap_or(0))
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<bool> {
        if let Some(mut docs) = self.collections.get_mut(&collection) {
            if let Some(pos) = docs.iter().position(|d| filter.matches(d)) {
                docs.remove(pos);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let mut removed = 0;
        if let Some(mut docs) = self.collections.get_mut(&collection) {
            let before = docs.len();
            docs.retain(|d| !filter.matches(d));
            removed = (before - docs.len()) as u64;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn add_to_set_is_idempotent() {
        let store = MemoryStore::new();
        store
            .insert(Collection::Communities, json!({"id": "c1", "members": []}))
            .await
            .unwrap();

        for _ in 0..3 {
            store
                .add_to_set(Collection::Communities, &Filter::id("c1"), "members", json!("u1"))
                .await
                .unwrap();
        }

        let doc = store
            .find_one(Collection::Communities, &Filter::id("c1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["members"], json!(["u1"]));
    }

    #[tokio::test]
    async fn pull_removes_all_occurrences() {
        let store = MemoryStore::new();
        store
            .insert(Collection::SubGroups, json!({"id": "sg", "members": ["a", "b", "a"]}))
            .await
            .unwrap();
        store
            .pull(Collection::SubGroups, &Filter::id("sg"), "members", json!("a"))
            .await
            .unwrap();
        let doc = store
            .find_one(Collection::SubGroups, &Filter::id("sg"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["members"], json!(["b"]));
    }

    #[tokio::test]
    async fn set_fields_touches_every_match() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .insert(
                    Collection::Messages,
                    json!({"id": format!("m{i}"), "chatId": "a_b", "status": "sent"}),
                )
                .await
                .unwrap();
        }
        let touched = store
            .set_fields(
                Collection::Messages,
                &Filter::field("chatId", "a_b"),
                json!({"status": "read"}),
            )
            .await
            .unwrap();
        assert_eq!(touched, 3);
        let read = store
            .count(Collection::Messages, &Filter::field("status", "read"))
            .await
            .unwrap();
        assert_eq!(read, 3);
    }

    #[tokio::test]
    async fn find_many_sorts_and_limits() {
        let store = MemoryStore::new();
        for (id, ts) in [("m1", "2025-01-03"), ("m2", "2025-01-01"), ("m3", "2025-01-02")] {
            store
                .insert(Collection::Messages, json!({"id": id, "timestamp": ts}))
                .await
                .unwrap();
        }
        let docs = store
            .find_many(
                Collection::Messages,
                &Filter::All,
                Some(&Sort::desc("timestamp")),
                Some(2),
            )
            .await
            .unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["m1", "m3"]);
    }

    #[tokio::test]
    async fn delete_many_by_group() {
        let store = MemoryStore::new();
        store
            .insert(Collection::Messages, json!({"id": "m1", "groupId": "g1"}))
            .await
            .unwrap();
        store
            .insert(Collection::Messages, json!({"id": "m2", "groupId": "g2"}))
            .await
            .unwrap();
        let removed = store
            .delete_many(Collection::Messages, &Filter::field("groupId", "g1"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count(Collection::Messages, &Filter::All).await.unwrap(), 1);
    }
}
