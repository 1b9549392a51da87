pub mod identity;
pub mod model;
pub mod query;
pub mod rating;
