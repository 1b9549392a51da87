use crate::app::{CatalogService, ReviewLedger};
use crate::domain::model::ModelRegistry;
use crate::infra::auth::TokenVerifier;
use crate::storage::document::{Document, DocumentStore};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub reviews: Arc<ReviewLedger>,
    pub model_registry: Arc<ModelRegistry>,
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        token_verifier: Arc<dyn TokenVerifier>,
        list_limit: u32,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(store.clone(), list_limit)),
            reviews: Arc::new(ReviewLedger::new(store.clone())),
            model_registry: Arc::new(ModelRegistry::with_catalog_models()),
            token_verifier,
            store,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(e) => Self::failure(format!("Failed to encode response: {}", e)),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Maximum number of entities (defaults to the configured list limit).
    pub limit: Option<u32>,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Name fragment, matched case-insensitively.
    #[serde(default)]
    pub q: String,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeaturedParams {
    /// Strict lower bound on the average rating (default 4).
    pub threshold: Option<f64>,
    /// Maximum number of entities (default 5).
    pub limit: Option<u32>,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NearbyParams {
    /// Strict upper bound on the distance in miles (default 2).
    pub max_distance: Option<f64>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateReviewRequest {
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

/// Free-form entity fields. `name` is required on create.
#[derive(Deserialize, Debug, ToSchema)]
pub struct EntityPayload(#[schema(value_type = Object)] pub Document);

pub fn json_422(err: JsonRejection, expected: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::failure(format!(
            "Invalid JSON body: {} (expected: {})",
            err, expected
        ))),
    )
}
