pub mod auth;
pub mod error;
pub mod router;
pub mod types;
pub mod handlers {
    pub mod catalog;
    pub mod common;
    pub mod health;
    pub mod reviews;
}

pub use router::{create_router, ApiDoc};
pub use types::AppState;
