pub mod aggregator;

pub use aggregator::{average_of_values, Reviewable, RATING_PLACES};
