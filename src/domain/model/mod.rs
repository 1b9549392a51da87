//! Domain model definitions for reviewable catalog entities.

use crate::domain::identity::Role;
use crate::storage::document::Document;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

pub mod catalog;
pub mod registry;
pub mod review;

pub use catalog::{NurseryModel, PlantModel, ProductModel};
pub use registry::ModelRegistry;
pub use review::{NewReview, Review};

pub const NAME_FIELD: &str = "name";
pub const OWNER_FIELD: &str = "owner";
pub const REVIEWS_FIELD: &str = "reviews";
pub const RATING_FIELD: &str = "rating";
pub const AVERAGE_RATING_FIELD: &str = "averageRating";
pub const OWNER_DETAILS_FIELD: &str = "ownerDetails";
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Distance from the buyer in miles.
pub const DISTANCE_FIELD: &str = "distance";

pub const USERS_COLLECTION: &str = "users";

/// User fields never exposed alongside catalog data.
pub const HIDDEN_USER_FIELDS: &[&str] = &["password", "passwordHash"];

/// Drops credential fields from a user record.
pub fn public_user(mut user: Document) -> Document {
    for field in HIDDEN_USER_FIELDS {
        user.remove(*field);
    }
    user
}

/// Fields a client can never set directly on create or update.
pub const PROTECTED_FIELDS: &[&str] = &[
    crate::storage::document::ID_FIELD,
    OWNER_FIELD,
    REVIEWS_FIELD,
    AVERAGE_RATING_FIELD,
    OWNER_DETAILS_FIELD,
    CREATED_AT_FIELD,
];

/// The reviewable entity variants. Each lives in its own collection and shares
/// the same review and rating behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Nursery,
    Plant,
    Product,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Nursery, EntityKind::Plant, EntityKind::Product];

    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Nursery => "nurseries",
            EntityKind::Plant => "plants",
            EntityKind::Product => "products",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Nursery => "Nursery",
            EntityKind::Plant => "Plant",
            EntityKind::Product => "Product",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Contract every catalog model fulfils.
///
/// Services work against this trait so that listing, search, reviews and ratings
/// are written once for all entity kinds. Each implementation provides:
/// - the entity kind (and with it the collection)
/// - the role allowed to create and delete entities, and the one allowed to update them
/// - optional kind-specific field checks
pub trait CatalogModel: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn collection(&self) -> &str {
        self.kind().collection()
    }

    /// Role required to create or delete entities of this kind. Admins always pass.
    fn managing_role(&self) -> Role;

    /// Role required to update entities of this kind; `None` lets any signed-in caller.
    fn updating_role(&self) -> Option<Role> {
        Some(self.managing_role())
    }

    /// Kind-specific checks shared by create and update. Only fields present are checked.
    fn validate_fields(&self, _payload: &Document) -> Result<(), String> {
        Ok(())
    }

    /// Validates a create payload (protected fields already stripped).
    fn validate_create_payload(&self, payload: &Document) -> Result<(), String> {
        match payload.get(NAME_FIELD).and_then(|v| v.as_str()) {
            Some(name) if !name.trim().is_empty() => {}
            _ => return Err(format!("{} must have a non-empty name field", self.kind())),
        }
        self.validate_fields(payload)
    }

    /// Validates an update payload (protected fields already stripped).
    fn validate_update_payload(&self, payload: &Document) -> Result<(), String> {
        if payload.is_empty() {
            return Err("Update must change at least one field".to_string());
        }
        if let Some(name) = payload.get(NAME_FIELD) {
            match name.as_str() {
                Some(n) if !n.trim().is_empty() => {}
                _ => return Err(format!("{} name must be a non-empty string", self.kind())),
            }
        }
        self.validate_fields(payload)
    }
}
