//! Query shapes shared by every catalog kind.
//!
//! Each builder returns plain store vocabulary ([`Filter`] / [`Pipeline`]); the
//! service decides which store call runs it.

use crate::domain::model::{
    AVERAGE_RATING_FIELD, DISTANCE_FIELD, NAME_FIELD, OWNER_DETAILS_FIELD, OWNER_FIELD, RATING_FIELD,
    REVIEWS_FIELD, USERS_COLLECTION,
};
use crate::domain::rating::RATING_PLACES;
use crate::storage::document::{Filter, Pipeline, Stage};
use serde_json::Value as JsonValue;

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const FEATURED_THRESHOLD: f64 = 4.0;
pub const FEATURED_LIMIT: u32 = 5;
/// Miles.
pub const NEARBY_MAX_DISTANCE: f64 = 2.0;

/// Server-side equivalent of `Reviewable::average_rating`.
pub fn average_rating_stage() -> Stage {
    Stage::Average {
        array_field: REVIEWS_FIELD.to_string(),
        value_field: RATING_FIELD.to_string(),
        as_field: AVERAGE_RATING_FIELD.to_string(),
        places: RATING_PLACES,
    }
}

/// First `limit` entities in storage order, each with its average rating.
pub fn list(limit: u32) -> Pipeline {
    Pipeline::new()
        .stage(average_rating_stage())
        .stage(Stage::Limit(limit))
}

/// Every entity whose name contains `fragment`, ignoring case. No limit.
pub fn search_by_partial_name(fragment: &str) -> Pipeline {
    Pipeline::new()
        .stage(Stage::Match(name_contains(fragment)))
        .stage(average_rating_stage())
}

pub fn name_contains(fragment: &str) -> Filter {
    Filter::contains_ignore_case(NAME_FIELD, fragment)
}

/// Entities rated strictly above `threshold`, best first, at most `limit`.
///
/// Unreviewed entities average to 0 and so never qualify for a non-negative threshold.
pub fn featured(threshold: f64, limit: u32) -> Pipeline {
    Pipeline::new()
        .stage(average_rating_stage())
        .stage(Stage::Match(Filter::GreaterThan {
            field: AVERAGE_RATING_FIELD.to_string(),
            value: threshold,
        }))
        .stage(Stage::Sort {
            field: AVERAGE_RATING_FIELD.to_string(),
            descending: true,
        })
        .stage(Stage::Limit(limit))
}

/// Entities closer than `max_distance` miles, in storage order. No limit.
///
/// Entities without a numeric `distance` are never nearby.
pub fn nearby(max_distance: f64) -> Pipeline {
    Pipeline::new()
        .stage(Stage::Match(Filter::LessThan {
            field: DISTANCE_FIELD.to_string(),
            value: max_distance,
        }))
        .stage(average_rating_stage())
}

/// One entity joined with the user referenced by its `owner` field.
pub fn join_owner(entity_id: &str) -> Pipeline {
    Pipeline::new()
        .stage(Stage::Match(Filter::id(entity_id)))
        .stage(Stage::Lookup {
            from: USERS_COLLECTION.to_string(),
            local_field: OWNER_FIELD.to_string(),
            as_field: OWNER_DETAILS_FIELD.to_string(),
        })
        .stage(average_rating_stage())
        .stage(Stage::Limit(1))
}

/// Matches another entity already using `name`, optionally excluding `except_id`.
pub fn name_taken(name: &str, except_id: Option<&str>) -> Filter {
    let same_name = Filter::eq(NAME_FIELD, JsonValue::String(name.to_string()));
    match except_id {
        Some(id) => same_name.and(Filter::id(id).not()),
        None => same_name,
    }
}
