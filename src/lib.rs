pub mod app;
pub mod domain;
pub mod error;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::{CatalogService, ReviewLedger};
pub use domain::model::{EntityKind, ModelRegistry, NurseryModel, PlantModel, ProductModel};
pub use error::CatalogError;
pub use storage::document::{DocumentStore, MemoryDocumentStore, PgDocumentStore};

use domain::model::USERS_COLLECTION;

/// Every collection the service reads or writes.
pub fn collections() -> Vec<&'static str> {
    EntityKind::ALL
        .iter()
        .map(|k| k.collection())
        .chain(std::iter::once(USERS_COLLECTION))
        .collect()
}
