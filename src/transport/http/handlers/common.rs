use crate::domain::model::CatalogModel;
use crate::transport::http::error::ApiError;
use crate::transport::http::types::AppState;
use std::sync::Arc;

/// Resolves the `:kind` path segment (`nurseries`, `plants`, `products`).
pub fn resolve_model(state: &AppState, kind: &str) -> Result<Arc<dyn CatalogModel>, ApiError> {
    state
        .model_registry
        .get(kind)
        .ok_or_else(|| ApiError::UnknownKind(kind.trim().to_string()))
}
