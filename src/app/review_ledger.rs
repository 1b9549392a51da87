//! Embedded review sequences.
//!
//! Append is a single atomic array push. Remove reads the sequence, drops the
//! matching element and writes the rest back only if the stored sequence is still
//! the one that was read; otherwise the caller gets `Conflict`.

use crate::app::parse_id;
use crate::domain::model::review::is_valid_rating;
use crate::domain::model::{
    public_user, EntityKind, NewReview, Review, REVIEWS_FIELD, USERS_COLLECTION,
};
use crate::error::{CatalogError, Result};
use crate::storage::document::{Document, DocumentStore, Filter, StoreError, Update, ID_FIELD};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A freshly appended review together with its author's user record.
#[derive(Debug, Clone, Serialize)]
pub struct PostedReview {
    #[serde(flatten)]
    pub review: Review,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Document>,
}

pub struct ReviewLedger {
    store: Arc<dyn DocumentStore>,
}

impl ReviewLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Appends a review to the entity and returns it with its generated id.
    pub async fn append(
        &self,
        kind: EntityKind,
        entity_id: &str,
        review: NewReview,
    ) -> Result<Review> {
        if !is_valid_rating(review.rating) {
            return Err(CatalogError::InvalidRating(review.rating));
        }
        let entity_id = parse_id(entity_id, kind.label())?;
        let author = parse_id(&review.author, "Author")?;

        let collection = kind.collection();
        let filter = Filter::id(&entity_id);
        if self.store.find_one(collection, &filter).await?.is_none() {
            return Err(CatalogError::NotFound(kind.label().to_string()));
        }

        let created = Review::new(author, review.rating, review.comment);
        let value = serde_json::to_value(&created).map_err(StoreError::from)?;
        let outcome = self
            .store
            .update_one(
                collection,
                &filter,
                &Update::Push {
                    field: REVIEWS_FIELD.to_string(),
                    value,
                },
            )
            .await?;
        // Deleted between the existence check and the push.
        if outcome.matched == 0 {
            return Err(CatalogError::NotFound(kind.label().to_string()));
        }

        info!(
            kind = %kind,
            entity_id = %entity_id,
            review_id = %created.id,
            rating = created.rating,
            "Review added"
        );
        Ok(created)
    }

    /// Looks up the author of a review. A missing user record is not an error.
    pub async fn with_author(&self, review: Review) -> Result<PostedReview> {
        let user = self
            .store
            .find_one(USERS_COLLECTION, &Filter::id(&review.author))
            .await?
            .map(public_user);
        if user.is_none() {
            debug!(author = %review.author, "Review author has no user record");
        }
        Ok(PostedReview { review, user })
    }

    /// Removes exactly one review by id, keeping the order of the others.
    pub async fn remove(&self, kind: EntityKind, entity_id: &str, review_id: &str) -> Result<()> {
        let entity_id = parse_id(entity_id, kind.label())?;
        let review_id = parse_id(review_id, "Review")?;

        let collection = kind.collection();
        let Some(entity) = self
            .store
            .find_one(collection, &Filter::id(&entity_id))
            .await?
        else {
            return Err(CatalogError::NotFoundEntity(kind.label().to_string()));
        };

        let current: Vec<JsonValue> = entity
            .get(REVIEWS_FIELD)
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let Some(index) = current
            .iter()
            .position(|r| r.get(ID_FIELD).and_then(|v| v.as_str()) == Some(review_id.as_str()))
        else {
            return Err(CatalogError::NotFoundReview {
                entity: kind.label().to_string(),
                review_id,
            });
        };

        let mut remaining = current.clone();
        remaining.remove(index);

        let unchanged = Filter::id(&entity_id).and(Filter::eq(REVIEWS_FIELD, JsonValue::Array(current)));
        let mut fields = Document::new();
        fields.insert(REVIEWS_FIELD.to_string(), JsonValue::Array(remaining));

        let outcome = self
            .store
            .update_one(collection, &unchanged, &Update::Set(fields))
            .await?;
        if outcome.matched == 0 {
            warn!(
                kind = %kind,
                entity_id = %entity_id,
                review_id = %review_id,
                "Review sequence changed during removal"
            );
            return Err(CatalogError::Conflict(kind.label().to_string()));
        }

        info!(kind = %kind, entity_id = %entity_id, review_id = %review_id, "Review deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::document::{MemoryDocumentStore, Pipeline, UpdateOutcome};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    const AUTHOR: &str = "0b3c6f2e-8a4d-4e55-9a67-2f1d3c4b5a69";

    fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn new_review(rating: i64) -> NewReview {
        NewReview {
            author: AUTHOR.to_string(),
            rating,
            comment: format!("{} stars", rating),
        }
    }

    async fn seed(store: &dyn DocumentStore, kind: EntityKind, reviews: JsonValue) -> String {
        let id = new_id();
        let doc = json!({ "_id": id, "name": format!("{} {}", kind, id), "reviews": reviews });
        store
            .insert_one(kind.collection(), doc.as_object().cloned().unwrap())
            .await
            .unwrap();
        id
    }

    async fn stored_reviews(store: &dyn DocumentStore, kind: EntityKind, id: &str) -> JsonValue {
        store
            .find_one(kind.collection(), &Filter::id(id))
            .await
            .unwrap()
            .unwrap()
            .get(REVIEWS_FIELD)
            .cloned()
            .unwrap_or(JsonValue::Null)
    }

    fn setup() -> (Arc<MemoryDocumentStore>, ReviewLedger) {
        let store = Arc::new(MemoryDocumentStore::new());
        let ledger = ReviewLedger::new(store.clone());
        (store, ledger)
    }

    #[tokio::test]
    async fn appends_keep_insertion_order() {
        let (store, ledger) = setup();
        let id = seed(store.as_ref(), EntityKind::Plant, json!([])).await;

        let mut appended = Vec::new();
        for rating in [5, 3, 4, 1, 2] {
            let review = ledger
                .append(EntityKind::Plant, &id, new_review(rating))
                .await
                .unwrap();
            assert_eq!(review.rating, rating);
            assert_eq!(review.author, AUTHOR);
            appended.push(review.id);
        }

        let reviews = stored_reviews(store.as_ref(), EntityKind::Plant, &id).await;
        let ids: Vec<&str> = reviews
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, appended.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn append_then_remove_restores_sequence() {
        let (store, ledger) = setup();
        let id = seed(
            store.as_ref(),
            EntityKind::Nursery,
            json!([
                { "_id": new_id(), "author": AUTHOR, "rating": 4, "comment": "a" },
                { "_id": new_id(), "author": AUTHOR, "rating": 2, "comment": "b" }
            ]),
        )
        .await;
        let before = stored_reviews(store.as_ref(), EntityKind::Nursery, &id).await;

        let review = ledger
            .append(EntityKind::Nursery, &id, new_review(5))
            .await
            .unwrap();
        ledger
            .remove(EntityKind::Nursery, &id, &review.id)
            .await
            .unwrap();

        let after = stored_reviews(store.as_ref(), EntityKind::Nursery, &id).await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn removes_only_the_matching_review() {
        let (store, ledger) = setup();
        let id = seed(store.as_ref(), EntityKind::Product, json!([])).await;
        let a = ledger.append(EntityKind::Product, &id, new_review(1)).await.unwrap();
        let b = ledger.append(EntityKind::Product, &id, new_review(2)).await.unwrap();
        let c = ledger.append(EntityKind::Product, &id, new_review(3)).await.unwrap();

        ledger.remove(EntityKind::Product, &id, &b.id).await.unwrap();

        let reviews = stored_reviews(store.as_ref(), EntityKind::Product, &id).await;
        let ids: Vec<&str> = reviews
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![a.id.as_str(), c.id.as_str()]);
    }

    #[tokio::test]
    async fn posted_review_carries_the_public_author_record() {
        let store = Arc::new(MemoryDocumentStore::new());
        let ledger = ReviewLedger::new(store.clone());
        let id = seed(store.as_ref(), EntityKind::Nursery, json!([])).await;

        let review = ledger.append(EntityKind::Nursery, &id, new_review(4)).await.unwrap();
        let posted = ledger.with_author(review.clone()).await.unwrap();
        assert!(posted.user.is_none());

        store
            .insert_one(
                USERS_COLLECTION,
                json!({ "_id": AUTHOR, "name": "Ada", "password": "hash" })
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .await
            .unwrap();
        let posted = ledger.with_author(review).await.unwrap();
        let body = serde_json::to_value(&posted).unwrap();
        assert_eq!(body["rating"], 4);
        assert_eq!(body["user"]["name"], "Ada");
        assert!(body["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn unknown_review_on_existing_entity_is_not_found_review() {
        let (store, ledger) = setup();
        let id = seed(store.as_ref(), EntityKind::Plant, json!([])).await;
        ledger.append(EntityKind::Plant, &id, new_review(4)).await.unwrap();

        let err = ledger
            .remove(EntityKind::Plant, &id, &new_id())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFoundReview { .. }));
    }

    #[tokio::test]
    async fn missing_entity_is_reported_per_operation() {
        let (_store, ledger) = setup();
        let err = ledger
            .remove(EntityKind::Nursery, &new_id(), &new_id())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFoundEntity(_)));

        let err = ledger
            .append(EntityKind::Nursery, &new_id(), new_review(3))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[tokio::test]
    async fn out_of_range_ratings_fail_for_every_kind() {
        let (store, ledger) = setup();
        for kind in EntityKind::ALL {
            let id = seed(store.as_ref(), kind, json!([])).await;
            for rating in [6, 0, -1] {
                let err = ledger.append(kind, &id, new_review(rating)).await.unwrap_err();
                assert!(
                    matches!(err, CatalogError::InvalidRating(r) if r == rating),
                    "{} accepted rating {}",
                    kind,
                    rating
                );
            }
            assert_eq!(stored_reviews(store.as_ref(), kind, &id).await, json!([]));
        }
    }

    #[tokio::test]
    async fn malformed_ids_are_invalid_arguments() {
        let (store, ledger) = setup();
        let id = seed(store.as_ref(), EntityKind::Plant, json!([])).await;

        let err = ledger
            .append(EntityKind::Plant, "plant-42", new_review(3))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));

        let err = ledger
            .remove(EntityKind::Plant, &id, "not-a-review")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn absent_reviews_field_behaves_like_empty() {
        let (store, ledger) = setup();
        let id = new_id();
        store
            .insert_one("nurseries", json!({ "_id": id, "name": "Legacy" }).as_object().cloned().unwrap())
            .await
            .unwrap();

        let err = ledger
            .remove(EntityKind::Nursery, &id, &new_id())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFoundReview { .. }));

        let review = ledger.append(EntityKind::Nursery, &id, new_review(5)).await.unwrap();
        let reviews = stored_reviews(store.as_ref(), EntityKind::Nursery, &id).await;
        assert_eq!(reviews.as_array().unwrap().len(), 1);
        assert_eq!(reviews[0]["_id"], json!(review.id));
    }

    /// Slips an extra review in right after every read, like a concurrent append.
    struct RacingStore {
        inner: MemoryDocumentStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl DocumentStore for RacingStore {
        async fn find_one(&self, c: &str, f: &Filter) -> std::result::Result<Option<Document>, StoreError> {
            let found = self.inner.find_one(c, f).await?;
            if found.is_some() && !self.raced.swap(true, Ordering::SeqCst) {
                self.inner
                    .update_one(
                        c,
                        f,
                        &Update::Push {
                            field: REVIEWS_FIELD.into(),
                            value: json!({ "_id": new_id(), "rating": 1 }),
                        },
                    )
                    .await?;
            }
            Ok(found)
        }
        async fn find(&self, c: &str, f: &Filter, l: Option<u32>) -> std::result::Result<Vec<Document>, StoreError> {
            self.inner.find(c, f, l).await
        }
        async fn insert_one(&self, c: &str, d: Document) -> std::result::Result<String, StoreError> {
            self.inner.insert_one(c, d).await
        }
        async fn update_one(&self, c: &str, f: &Filter, u: &Update) -> std::result::Result<UpdateOutcome, StoreError> {
            self.inner.update_one(c, f, u).await
        }
        async fn delete_one(&self, c: &str, f: &Filter) -> std::result::Result<u64, StoreError> {
            self.inner.delete_one(c, f).await
        }
        async fn aggregate(&self, c: &str, p: &Pipeline) -> std::result::Result<Vec<Document>, StoreError> {
            self.inner.aggregate(c, p).await
        }
        async fn ping(&self) -> std::result::Result<(), StoreError> {
            Ok(())
        }
        async fn close(&self) {}
    }

    #[tokio::test]
    async fn concurrent_change_during_remove_is_a_conflict() {
        let store = Arc::new(RacingStore {
            inner: MemoryDocumentStore::new(),
            raced: AtomicBool::new(true),
        });
        let ledger = ReviewLedger::new(store.clone());
        let id = seed(store.as_ref(), EntityKind::Plant, json!([])).await;
        let review = ledger.append(EntityKind::Plant, &id, new_review(4)).await.unwrap();

        store.raced.store(false, Ordering::SeqCst);
        let err = ledger
            .remove(EntityKind::Plant, &id, &review.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));

        // Nothing was lost: the first review and the racing one are both there.
        let reviews = stored_reviews(&store.inner, EntityKind::Plant, &id).await;
        assert_eq!(reviews.as_array().unwrap().len(), 2);
    }

    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn find_one(&self, _: &str, _: &Filter) -> std::result::Result<Option<Document>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn find(&self, _: &str, _: &Filter, _: Option<u32>) -> std::result::Result<Vec<Document>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn insert_one(&self, _: &str, _: Document) -> std::result::Result<String, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn update_one(&self, _: &str, _: &Filter, _: &Update) -> std::result::Result<UpdateOutcome, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn delete_one(&self, _: &str, _: &Filter) -> std::result::Result<u64, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn aggregate(&self, _: &str, _: &Pipeline) -> std::result::Result<Vec<Document>, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn ping(&self) -> std::result::Result<(), StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn close(&self) {}
    }

    #[tokio::test]
    async fn store_failures_surface_as_internal() {
        let ledger = ReviewLedger::new(Arc::new(FailingStore));
        let err = ledger
            .append(EntityKind::Product, &new_id(), new_review(4))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Internal(_)));

        let err = ledger
            .remove(EntityKind::Product, &new_id(), &new_id())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Internal(_)));
    }
}
