use crate::domain::model::NewReview;
use crate::transport::http::auth::Authenticated;
use crate::transport::http::error::ApiError;
use crate::transport::http::handlers::common::resolve_model;
use crate::transport::http::types::{json_422, ApiResponse, AppState, CreateReviewRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[utoipa::path(
    post,
    path = "/api/{kind}/{id}/reviews",
    params(
        ("kind" = String, Path, description = "nurseries | plants | products"),
        ("id" = String, Path, description = "Entity id (UUID)")
    ),
    request_body = CreateReviewRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Review appended; includes the author's user record when known", body = ApiResponse),
        (status = 400, description = "Rating out of range or malformed id", body = ApiResponse),
        (status = 401, description = "Missing or unknown token", body = ApiResponse),
        (status = 404, description = "Entity not found", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse)
    )
)]
pub async fn append_review_handler(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    caller: Authenticated,
    request: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let model = resolve_model(&state, &kind)?;
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => {
            return Ok(json_422(e, "{\"rating\": 1..5, \"comment\": \"...\"}").into_response())
        }
    };

    let review = state
        .reviews
        .append(
            model.kind(),
            &id,
            NewReview {
                author: caller.0.subject,
                rating: request.rating,
                comment: request.comment,
            },
        )
        .await?;
    let posted = state.reviews.with_author(review).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(posted))).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/{kind}/{id}/reviews/{review_id}",
    params(
        ("kind" = String, Path, description = "nurseries | plants | products"),
        ("id" = String, Path, description = "Entity id (UUID)"),
        ("review_id" = String, Path, description = "Review id (UUID)")
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Review removed", body = ApiResponse),
        (status = 400, description = "Malformed id", body = ApiResponse),
        (status = 401, description = "Missing or unknown token", body = ApiResponse),
        (status = 404, description = "Entity or review not found", body = ApiResponse),
        (status = 409, description = "Reviews changed concurrently", body = ApiResponse)
    )
)]
pub async fn remove_review_handler(
    State(state): State<AppState>,
    Path((kind, id, review_id)): Path<(String, String, String)>,
    _caller: Authenticated,
) -> Result<Json<ApiResponse>, ApiError> {
    let model = resolve_model(&state, &kind)?;
    state.reviews.remove(model.kind(), &id, &review_id).await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "deleted": review_id }))))
}
