use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// A review embedded in its parent entity's `reviews` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: String,
    /// User id of the author.
    pub author: String,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Review {
    /// Builds a review with a freshly generated id.
    pub fn new(author: String, rating: i64, comment: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author,
            rating,
            comment,
            created_at: Some(Utc::now()),
        }
    }
}

/// Input of the append operation, before an id is assigned.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub author: String,
    pub rating: i64,
    pub comment: String,
}

pub fn is_valid_rating(rating: i64) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&rating)
}
