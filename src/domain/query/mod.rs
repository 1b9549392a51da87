pub mod catalog;

pub use catalog::{DEFAULT_LIST_LIMIT, FEATURED_LIMIT, FEATURED_THRESHOLD, NEARBY_MAX_DISTANCE};
