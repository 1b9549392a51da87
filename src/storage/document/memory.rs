//! In-process document store.
//!
//! Used when no `DATABASE_URL` is configured and by the test suites. Collections
//! are created on first write; reading an unknown collection yields nothing.

use super::query::{Filter, Pipeline, Stage, Update};
use super::{
    ensure_document_id, validate_collection, Document, DocumentStore, StoreError, UpdateOutcome,
    ID_FIELD,
};
use crate::domain::rating::average_of_values;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        validate_collection(collection)?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, filter)).cloned()))
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<u32>,
    ) -> Result<Vec<Document>, StoreError> {
        validate_collection(collection)?;
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let limit = limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(docs
            .iter()
            .filter(|d| matches(d, filter))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_one(&self, collection: &str, mut doc: Document) -> Result<String, StoreError> {
        validate_collection(collection)?;
        let id = ensure_document_id(&mut doc);
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs
            .iter()
            .any(|d| d.get(ID_FIELD).and_then(|v| v.as_str()) == Some(id.as_str()))
        {
            return Err(StoreError::DuplicateId(id));
        }
        docs.push(doc);
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateOutcome, StoreError> {
        validate_collection(collection)?;
        let mut collections = self.collections.write().await;
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| matches(d, filter)))
        else {
            return Ok(UpdateOutcome::default());
        };

        match update {
            Update::Set(fields) => {
                for (k, v) in fields {
                    doc.insert(k.clone(), v.clone());
                }
            }
            Update::Push { field, value } => match doc.get_mut(field) {
                Some(JsonValue::Array(items)) => items.push(value.clone()),
                _ => {
                    doc.insert(field.clone(), JsonValue::Array(vec![value.clone()]));
                }
            },
        }
        Ok(UpdateOutcome { matched: 1 })
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        validate_collection(collection)?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter().position(|d| matches(d, filter)) {
            Some(idx) => {
                docs.remove(idx);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &Pipeline,
    ) -> Result<Vec<Document>, StoreError> {
        validate_collection(collection)?;
        let collections = self.collections.read().await;
        let mut docs: Vec<Document> = collections.get(collection).cloned().unwrap_or_default();

        for stage in pipeline.stages() {
            match stage {
                Stage::Match(filter) => docs.retain(|d| matches(d, filter)),
                Stage::Lookup {
                    from,
                    local_field,
                    as_field,
                } => {
                    validate_collection(from)?;
                    let foreign = collections.get(from.as_str());
                    for doc in docs.iter_mut() {
                        let joined: Vec<JsonValue> = match (doc.get(local_field), foreign) {
                            (Some(local), Some(foreign)) => foreign
                                .iter()
                                .filter(|f| f.get(ID_FIELD) == Some(local))
                                .cloned()
                                .map(JsonValue::Object)
                                .collect(),
                            _ => Vec::new(),
                        };
                        doc.insert(as_field.clone(), JsonValue::Array(joined));
                    }
                }
                Stage::Average {
                    array_field,
                    value_field,
                    as_field,
                    places,
                } => {
                    for doc in docs.iter_mut() {
                        let avg = {
                            let values = doc
                                .get(array_field)
                                .and_then(|v| v.as_array())
                                .map(|items| {
                                    items
                                        .iter()
                                        .filter_map(|item| item.get(value_field))
                                        .collect::<Vec<_>>()
                                })
                                .unwrap_or_default();
                            average_of_values(values, *places)
                        };
                        doc.insert(as_field.clone(), number(avg));
                    }
                }
                Stage::Sort { field, descending } => {
                    // Vec::sort_by is stable, so ties keep storage order.
                    docs.sort_by(|a, b| {
                        compare_numeric(a.get(field), b.get(field), *descending)
                    });
                }
                Stage::Limit(n) => docs.truncate(*n as usize),
            }
        }
        Ok(docs)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) {}
}

fn matches(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::All => true,
        Filter::Eq { field, value } => doc.get(field) == Some(value),
        Filter::ContainsIgnoreCase { field, fragment } => doc
            .get(field)
            .and_then(|v| v.as_str())
            .map(|s| s.to_lowercase().contains(&fragment.to_lowercase()))
            .unwrap_or(false),
        Filter::GreaterThan { field, value } => doc
            .get(field)
            .and_then(|v| v.as_f64())
            .map(|x| x > *value)
            .unwrap_or(false),
        Filter::LessThan { field, value } => doc
            .get(field)
            .and_then(|v| v.as_f64())
            .map(|x| x < *value)
            .unwrap_or(false),
        Filter::And(filters) => filters.iter().all(|f| matches(doc, f)),
        Filter::Not(inner) => !matches(doc, inner),
    }
}

fn compare_numeric(a: Option<&JsonValue>, b: Option<&JsonValue>, descending: bool) -> Ordering {
    match (a.and_then(|v| v.as_f64()), b.and_then(|v| v.as_f64())) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn number(x: f64) -> JsonValue {
    serde_json::Number::from_f64(x)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: JsonValue) -> Document {
        v.as_object().cloned().unwrap()
    }

    async fn seeded() -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        for (id, name, ratings) in [
            ("a", "Old Rosebush", vec![5, 4]),
            ("b", "Fern Hollow", vec![]),
            ("c", "Rose Garden Supply", vec![3]),
        ] {
            let reviews: Vec<JsonValue> = ratings.iter().map(|r| json!({ "rating": r })).collect();
            store
                .insert_one("nurseries", doc(json!({ "_id": id, "name": name, "reviews": reviews })))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn find_respects_filter_and_limit() {
        let store = seeded().await;
        let all = store.find("nurseries", &Filter::All, None).await.unwrap();
        assert_eq!(all.len(), 3);
        let two = store.find("nurseries", &Filter::All, Some(2)).await.unwrap();
        assert_eq!(two.len(), 2);
        let roses = store
            .find("nurseries", &Filter::contains_ignore_case("name", "ROSE"), None)
            .await
            .unwrap();
        assert_eq!(roses.len(), 2);
        let none = store.find("missing", &Filter::All, None).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn numeric_bounds_and_substrings_skip_other_types() {
        let store = MemoryDocumentStore::new();
        for (id, name, distance) in [
            ("near", json!("Corner Nursery"), json!(1.5)),
            ("far", json!("Hill Nursery"), json!(7)),
            ("text", json!(404), json!("1 mile")),
        ] {
            store
                .insert_one("nurseries", doc(json!({ "_id": id, "name": name, "distance": distance })))
                .await
                .unwrap();
        }

        let close = Filter::LessThan {
            field: "distance".into(),
            value: 2.0,
        };
        let hits = store.find("nurseries", &close, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["_id"], "near");

        // A numeric name is never a substring match, even for its own digits.
        let digits = store
            .find("nurseries", &Filter::contains_ignore_case("name", "40"), None)
            .await
            .unwrap();
        assert!(digits.is_empty());
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids_and_generates_missing_ones() {
        let store = seeded().await;
        let err = store
            .insert_one("nurseries", doc(json!({ "_id": "a" })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(_)));

        let id = store
            .insert_one("nurseries", doc(json!({ "name": "New" })))
            .await
            .unwrap();
        let found = store.find_one("nurseries", &Filter::id(&id)).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn push_creates_missing_arrays() {
        let store = MemoryDocumentStore::new();
        store
            .insert_one("plants", doc(json!({ "_id": "p" })))
            .await
            .unwrap();
        let out = store
            .update_one(
                "plants",
                &Filter::id("p"),
                &Update::Push {
                    field: "reviews".into(),
                    value: json!({ "rating": 2 }),
                },
            )
            .await
            .unwrap();
        assert_eq!(out.matched, 1);
        let p = store.find_one("plants", &Filter::id("p")).await.unwrap().unwrap();
        assert_eq!(p["reviews"], json!([{ "rating": 2 }]));
    }

    #[tokio::test]
    async fn update_and_delete_report_misses() {
        let store = seeded().await;
        let out = store
            .update_one("nurseries", &Filter::id("zzz"), &Update::Set(Document::new()))
            .await
            .unwrap();
        assert_eq!(out.matched, 0);
        assert_eq!(store.delete_one("nurseries", &Filter::id("zzz")).await.unwrap(), 0);
        assert_eq!(store.delete_one("nurseries", &Filter::id("a")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn aggregate_average_sort_limit() {
        let store = seeded().await;
        let pipeline = Pipeline::new()
            .stage(Stage::Average {
                array_field: "reviews".into(),
                value_field: "rating".into(),
                as_field: "averageRating".into(),
                places: 2,
            })
            .stage(Stage::Sort {
                field: "averageRating".into(),
                descending: true,
            })
            .stage(Stage::Limit(2));
        let docs = store.aggregate("nurseries", &pipeline).await.unwrap();
        let ratings: Vec<f64> = docs
            .iter()
            .map(|d| d["averageRating"].as_f64().unwrap())
            .collect();
        assert_eq!(ratings, vec![4.5, 3.0]);
    }

    #[tokio::test]
    async fn lookup_yields_empty_array_for_dangling_reference() {
        let store = MemoryDocumentStore::new();
        store
            .insert_one("users", doc(json!({ "_id": "u1", "name": "Ada" })))
            .await
            .unwrap();
        store
            .insert_one("products", doc(json!({ "_id": "p1", "owner": "u1" })))
            .await
            .unwrap();
        store
            .insert_one("products", doc(json!({ "_id": "p2", "owner": "gone" })))
            .await
            .unwrap();

        let docs = store
            .aggregate(
                "products",
                &Pipeline::new().stage(Stage::Lookup {
                    from: "users".into(),
                    local_field: "owner".into(),
                    as_field: "ownerDetails".into(),
                }),
            )
            .await
            .unwrap();
        assert_eq!(docs[0]["ownerDetails"][0]["name"], "Ada");
        assert_eq!(docs[1]["ownerDetails"], json!([]));
    }

    #[tokio::test]
    async fn rejects_invalid_collection_names() {
        let store = MemoryDocumentStore::new();
        let err = store.find("bad name", &Filter::All, None).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidCollection(_)));
    }
}
