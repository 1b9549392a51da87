//! The Catalog Service.
//!
//! This module sits between the HTTP handlers and the document store.
//! It is responsible for:
//! 1.  Listing, searching and ranking entities, with the average rating computed
//!     by the store inside the aggregation pipeline.
//! 2.  Single-entity reads, with the average rating computed in-process.
//! 3.  Creating, updating and deleting entities of any reviewable kind.

use crate::app::parse_id;
use crate::domain::model::{
    public_user, CatalogModel, AVERAGE_RATING_FIELD, CREATED_AT_FIELD, NAME_FIELD, OWNER_DETAILS_FIELD,
    OWNER_FIELD, PROTECTED_FIELDS, REVIEWS_FIELD,
};
use crate::domain::query::{
    catalog as query, FEATURED_LIMIT, FEATURED_THRESHOLD, NEARBY_MAX_DISTANCE,
};
use crate::domain::rating::Reviewable;
use crate::error::{CatalogError, Result};
use crate::storage::document::{Document, DocumentStore, Filter, Update, ID_FIELD};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info};

/// An entity merged with the user record it references through `owner`.
#[derive(Debug, Clone, Serialize)]
pub struct OwnedEntity {
    #[serde(flatten)]
    pub entity: Document,
    #[serde(rename = "ownerDetails", skip_serializing_if = "Option::is_none")]
    pub owner: Option<Document>,
}

pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
    list_limit: u32,
}

impl CatalogService {
    pub fn new(store: Arc<dyn DocumentStore>, list_limit: u32) -> Self {
        Self { store, list_limit }
    }

    pub fn list_limit(&self) -> u32 {
        self.list_limit
    }

    /// Up to `limit` entities (default: the configured list limit) in storage order.
    pub async fn list(&self, model: &dyn CatalogModel, limit: Option<u32>) -> Result<Vec<Document>> {
        let limit = limit.unwrap_or(self.list_limit);
        let docs = self
            .store
            .aggregate(model.collection(), &query::list(limit))
            .await?;
        debug!(kind = %model.kind(), limit, count = docs.len(), "Listed entities");
        Ok(docs)
    }

    /// Every entity whose name contains `fragment`, ignoring case.
    pub async fn search(&self, model: &dyn CatalogModel, fragment: &str) -> Result<Vec<Document>> {
        let docs = self
            .store
            .aggregate(model.collection(), &query::search_by_partial_name(fragment))
            .await?;
        debug!(kind = %model.kind(), fragment, count = docs.len(), "Searched entities");
        Ok(docs)
    }

    /// Best-rated entities strictly above `threshold` (default 4), at most `limit` (default 5).
    ///
    /// The threshold may not be negative, so unreviewed entities (average 0) never qualify.
    pub async fn featured(
        &self,
        model: &dyn CatalogModel,
        threshold: Option<f64>,
        limit: Option<u32>,
    ) -> Result<Vec<Document>> {
        let threshold = threshold.unwrap_or(FEATURED_THRESHOLD);
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(CatalogError::InvalidArgument(format!(
                "threshold must be a non-negative number, got {}",
                threshold
            )));
        }
        let pipeline = query::featured(threshold, limit.unwrap_or(FEATURED_LIMIT));
        Ok(self.store.aggregate(model.collection(), &pipeline).await?)
    }

    /// Entities closer than `max_distance` miles (default 2).
    pub async fn nearby(
        &self,
        model: &dyn CatalogModel,
        max_distance: Option<f64>,
    ) -> Result<Vec<Document>> {
        let max_distance = max_distance.unwrap_or(NEARBY_MAX_DISTANCE);
        if !max_distance.is_finite() || max_distance <= 0.0 {
            return Err(CatalogError::InvalidArgument(format!(
                "max_distance must be a positive number of miles, got {}",
                max_distance
            )));
        }
        let docs = self
            .store
            .aggregate(model.collection(), &query::nearby(max_distance))
            .await?;
        debug!(kind = %model.kind(), max_distance, count = docs.len(), "Listed nearby entities");
        Ok(docs)
    }

    /// A single entity with its average rating.
    pub async fn get(&self, model: &dyn CatalogModel, id: &str) -> Result<Document> {
        let label = model.kind().label();
        let id = parse_id(id, label)?;
        let mut doc = self
            .store
            .find_one(model.collection(), &Filter::id(&id))
            .await?
            .ok_or_else(|| CatalogError::NotFound(label.to_string()))?;
        annotate(&mut doc);
        Ok(doc)
    }

    /// A single entity with its owner's user record, if the owner still exists.
    pub async fn join_owner(&self, model: &dyn CatalogModel, id: &str) -> Result<OwnedEntity> {
        let label = model.kind().label();
        let id = parse_id(id, label)?;
        let mut entity = self
            .store
            .aggregate(model.collection(), &query::join_owner(&id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::NotFound(label.to_string()))?;

        let owner = match entity.remove(OWNER_DETAILS_FIELD) {
            Some(JsonValue::Array(users)) => users.into_iter().find_map(|u| match u {
                JsonValue::Object(user) => Some(public_user(user)),
                _ => None,
            }),
            _ => None,
        };
        Ok(OwnedEntity { entity, owner })
    }

    /// Creates an entity owned by `owner` with an empty review sequence.
    pub async fn create(
        &self,
        model: &dyn CatalogModel,
        owner: &str,
        payload: Document,
    ) -> Result<Document> {
        let kind = model.kind();
        let owner = parse_id(owner, "Owner")?;
        let mut doc = strip_protected(payload);
        model
            .validate_create_payload(&doc)
            .map_err(CatalogError::InvalidArgument)?;

        let name = doc
            .get(NAME_FIELD)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        self.ensure_name_free(model, &name, None).await?;

        let id = uuid::Uuid::new_v4().to_string();
        doc.insert(ID_FIELD.to_string(), JsonValue::String(id.clone()));
        doc.insert(OWNER_FIELD.to_string(), JsonValue::String(owner));
        doc.insert(REVIEWS_FIELD.to_string(), JsonValue::Array(Vec::new()));
        doc.insert(
            CREATED_AT_FIELD.to_string(),
            JsonValue::String(Utc::now().to_rfc3339()),
        );

        self.store.insert_one(model.collection(), doc.clone()).await?;
        info!(kind = %kind, id = %id, name = %name, "Entity created");

        annotate(&mut doc);
        Ok(doc)
    }

    /// Overwrites the given fields and returns the updated entity.
    pub async fn update(
        &self,
        model: &dyn CatalogModel,
        id: &str,
        payload: Document,
    ) -> Result<Document> {
        let kind = model.kind();
        let id = parse_id(id, kind.label())?;
        let fields = strip_protected(payload);
        model
            .validate_update_payload(&fields)
            .map_err(CatalogError::InvalidArgument)?;

        if let Some(name) = fields.get(NAME_FIELD).and_then(|v| v.as_str()) {
            self.ensure_name_free(model, name, Some(&id)).await?;
        }

        let filter = Filter::id(&id);
        let outcome = self
            .store
            .update_one(model.collection(), &filter, &Update::Set(fields))
            .await?;
        if outcome.matched == 0 {
            return Err(CatalogError::NotFound(kind.label().to_string()));
        }
        info!(kind = %kind, id = %id, "Entity updated");

        let mut doc = self
            .store
            .find_one(model.collection(), &filter)
            .await?
            .ok_or_else(|| CatalogError::NotFound(kind.label().to_string()))?;
        annotate(&mut doc);
        Ok(doc)
    }

    /// Deletes an entity together with its embedded reviews.
    pub async fn delete(&self, model: &dyn CatalogModel, id: &str) -> Result<()> {
        let kind = model.kind();
        let id = parse_id(id, kind.label())?;
        let deleted = self
            .store
            .delete_one(model.collection(), &Filter::id(&id))
            .await?;
        if deleted == 0 {
            return Err(CatalogError::NotFound(kind.label().to_string()));
        }
        info!(kind = %kind, id = %id, "Entity deleted");
        Ok(())
    }

    async fn ensure_name_free(
        &self,
        model: &dyn CatalogModel,
        name: &str,
        except_id: Option<&str>,
    ) -> Result<()> {
        let taken = self
            .store
            .find_one(model.collection(), &query::name_taken(name, except_id))
            .await?;
        if taken.is_some() {
            return Err(CatalogError::DuplicateName {
                kind: model.kind().label().to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

/// Adds the in-process `averageRating` to a fetched document.
fn annotate(doc: &mut Document) {
    let avg = doc.average_rating();
    let value = serde_json::Number::from_f64(avg)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null);
    doc.insert(AVERAGE_RATING_FIELD.to_string(), value);
}

fn strip_protected(mut payload: Document) -> Document {
    for field in PROTECTED_FIELDS {
        if payload.remove(*field).is_some() {
            debug!(field, "Ignoring protected field in payload");
        }
    }
    payload
}
