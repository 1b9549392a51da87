pub mod auth;
pub mod config;

pub use auth::{StaticTokenVerifier, TokenVerifier};
pub use config::Config;
