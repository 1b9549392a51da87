use crate::storage::document::StoreError;
use thiserror::Error;

/// Failures of the catalog and review operations.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Single-entity lookup on a well-formed id that matches nothing.
    #[error("{0} not found")]
    NotFound(String),

    /// Review operations: the parent entity is missing.
    #[error("{0} not found")]
    NotFoundEntity(String),

    /// Review operations: the entity exists but carries no such review.
    #[error("Review {review_id} not found in {entity}")]
    NotFoundReview { entity: String, review_id: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Rating should be between 1 and 5, got {0}")]
    InvalidRating(i64),

    #[error("{kind} with name '{name}' already exists")]
    DuplicateName { kind: String, name: String },

    /// The review sequence changed between read and rewrite.
    #[error("Reviews of {0} changed concurrently, retry the request")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
