//! Document persistence.
//!
//! Catalog entities are stored as JSON documents, one collection per entity kind.
//! The rest of the crate only talks to the [`DocumentStore`] trait; the concrete
//! backend is picked once at startup and injected through `AppState`.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;

pub mod memory;
pub mod postgres;
pub mod query;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;
pub use query::{Filter, Pipeline, Stage, Update};

/// A stored document. Every document carries its identifier under `_id`.
pub type Document = serde_json::Map<String, JsonValue>;

/// Field holding the document identifier.
pub const ID_FIELD: &str = "_id";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),

    #[error("Stored value is not a document: {0}")]
    NotADocument(String),

    #[error("Duplicate document id: {0}")]
    DuplicateId(String),
}

/// Outcome of an `update_one` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    /// Number of documents the filter matched (0 or 1).
    pub matched: u64,
}

/// Generic document-store primitives.
///
/// Single-document operations act on the first document in storage order that
/// matches the filter.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, filter: &Filter)
        -> Result<Option<Document>, StoreError>;

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<u32>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Inserts a document and returns its id. A missing `_id` is generated.
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<String, StoreError>;

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Returns the number of deleted documents (0 or 1).
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &Pipeline,
    ) -> Result<Vec<Document>, StoreError>;

    /// Reachability check used by `/health` and `preflight`.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Releases backend resources. Called once on shutdown.
    async fn close(&self);
}

/// Collection names double as SQL identifiers in the postgres backend.
pub fn validate_collection(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}

/// Returns the document's `_id`, generating one when absent.
pub(crate) fn ensure_document_id(doc: &mut Document) -> String {
    match doc.get(ID_FIELD).and_then(|v| v.as_str()) {
        Some(id) => id.to_string(),
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            doc.insert(ID_FIELD.to_string(), JsonValue::String(id.clone()));
            id
        }
    }
}

pub(crate) fn into_document(value: JsonValue) -> Result<Document, StoreError> {
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(StoreError::NotADocument(other.to_string())),
    }
}

/// Opens the backend selected by configuration.
///
/// An empty `database_url` selects the in-memory store.
pub async fn connect(
    database_url: Option<&str>,
    max_connections: u32,
    collections: &[&str],
) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match database_url {
        Some(url) if !url.trim().is_empty() => {
            let store = PgDocumentStore::connect(url, max_connections).await?;
            for collection in collections {
                store.ensure_collection(collection).await?;
            }
            Ok(Arc::new(store))
        }
        _ => Ok(Arc::new(MemoryDocumentStore::new())),
    }
}
