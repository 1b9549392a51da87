use crate::domain::model::Review;
use crate::transport::http::handlers::{catalog, health, reviews};
use crate::transport::http::types::{ApiResponse, AppState, CreateReviewRequest, EntityPayload};
use axum::routing::{delete, get, post};
use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        catalog::list_handler,
        catalog::search_handler,
        catalog::search_path_handler,
        catalog::featured_handler,
        catalog::nearby_handler,
        catalog::get_handler,
        catalog::owner_handler,
        catalog::create_handler,
        catalog::update_handler,
        catalog::delete_handler,
        reviews::append_review_handler,
        reviews::remove_review_handler
    ),
    components(schemas(ApiResponse, CreateReviewRequest, EntityPayload, Review)),
    modifiers(&BearerAuth)
)]
#[allow(dead_code)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route(
            "/api/:kind",
            get(catalog::list_handler).post(catalog::create_handler),
        )
        .route("/api/:kind/search", get(catalog::search_handler))
        .route("/api/:kind/search/:fragment", get(catalog::search_path_handler))
        .route("/api/:kind/featured", get(catalog::featured_handler))
        .route("/api/:kind/nearby", get(catalog::nearby_handler))
        .route(
            "/api/:kind/:id",
            get(catalog::get_handler)
                .patch(catalog::update_handler)
                .delete(catalog::delete_handler),
        )
        .route("/api/:kind/:id/owner", get(catalog::owner_handler))
        .route("/api/:kind/:id/reviews", post(reviews::append_review_handler))
        .route(
            "/api/:kind/:id/reviews/:review_id",
            delete(reviews::remove_review_handler),
        )
        .with_state(app_state)
}
