use crate::transport::http::auth::Authenticated;
use crate::transport::http::error::ApiError;
use crate::transport::http::handlers::common::resolve_model;
use crate::transport::http::types::{
    json_422, ApiResponse, AppState, EntityPayload, FeaturedParams, ListParams, NearbyParams,
    SearchParams,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

const ENTITY_EXPECTED: &str = "{\"name\": \"...\", ...}";

#[utoipa::path(
    get,
    path = "/api/{kind}",
    params(
        ("kind" = String, Path, description = "nurseries | plants | products"),
        ListParams
    ),
    responses(
        (status = 200, description = "Entities with their average rating, in storage order", body = ApiResponse),
        (status = 404, description = "Unknown entity kind", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn list_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse>, ApiError> {
    let model = resolve_model(&state, &kind)?;
    let docs = state.catalog.list(model.as_ref(), params.limit).await?;
    Ok(Json(ApiResponse::ok(docs)))
}

#[utoipa::path(
    get,
    path = "/api/{kind}/search",
    params(
        ("kind" = String, Path, description = "nurseries | plants | products"),
        SearchParams
    ),
    responses(
        (status = 200, description = "Entities whose name contains the fragment", body = ApiResponse),
        (status = 404, description = "Unknown entity kind", body = ApiResponse)
    )
)]
pub async fn search_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse>, ApiError> {
    let model = resolve_model(&state, &kind)?;
    let docs = state.catalog.search(model.as_ref(), &params.q).await?;
    Ok(Json(ApiResponse::ok(docs)))
}

#[utoipa::path(
    get,
    path = "/api/{kind}/search/{fragment}",
    params(
        ("kind" = String, Path, description = "nurseries | plants | products"),
        ("fragment" = String, Path, description = "Name fragment, matched case-insensitively")
    ),
    responses(
        (status = 200, description = "Entities whose name contains the fragment", body = ApiResponse),
        (status = 404, description = "Unknown entity kind", body = ApiResponse)
    )
)]
pub async fn search_path_handler(
    State(state): State<AppState>,
    Path((kind, fragment)): Path<(String, String)>,
) -> Result<Json<ApiResponse>, ApiError> {
    let model = resolve_model(&state, &kind)?;
    let docs = state.catalog.search(model.as_ref(), &fragment).await?;
    Ok(Json(ApiResponse::ok(docs)))
}

#[utoipa::path(
    get,
    path = "/api/{kind}/featured",
    params(
        ("kind" = String, Path, description = "nurseries | plants | products"),
        FeaturedParams
    ),
    responses(
        (status = 200, description = "Best-rated entities, highest first", body = ApiResponse),
        (status = 400, description = "Invalid threshold", body = ApiResponse),
        (status = 404, description = "Unknown entity kind", body = ApiResponse)
    )
)]
pub async fn featured_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<FeaturedParams>,
) -> Result<Json<ApiResponse>, ApiError> {
    let model = resolve_model(&state, &kind)?;
    let docs = state
        .catalog
        .featured(model.as_ref(), params.threshold, params.limit)
        .await?;
    Ok(Json(ApiResponse::ok(docs)))
}

#[utoipa::path(
    get,
    path = "/api/{kind}/nearby",
    params(
        ("kind" = String, Path, description = "nurseries | plants | products"),
        NearbyParams
    ),
    responses(
        (status = 200, description = "Entities closer than the distance, with their average rating", body = ApiResponse),
        (status = 400, description = "Invalid distance", body = ApiResponse),
        (status = 404, description = "Unknown entity kind", body = ApiResponse)
    )
)]
pub async fn nearby_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<ApiResponse>, ApiError> {
    let model = resolve_model(&state, &kind)?;
    let docs = state.catalog.nearby(model.as_ref(), params.max_distance).await?;
    Ok(Json(ApiResponse::ok(docs)))
}

#[utoipa::path(
    get,
    path = "/api/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "nurseries | plants | products"),
        ("id" = String, Path, description = "Entity id (UUID)")
    ),
    responses(
        (status = 200, description = "The entity with its average rating", body = ApiResponse),
        (status = 400, description = "Malformed id", body = ApiResponse),
        (status = 404, description = "Entity not found", body = ApiResponse)
    )
)]
pub async fn get_handler(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse>, ApiError> {
    let model = resolve_model(&state, &kind)?;
    let doc = state.catalog.get(model.as_ref(), &id).await?;
    Ok(Json(ApiResponse::ok(doc)))
}

#[utoipa::path(
    get,
    path = "/api/{kind}/{id}/owner",
    params(
        ("kind" = String, Path, description = "nurseries | plants | products"),
        ("id" = String, Path, description = "Entity id (UUID)")
    ),
    responses(
        (status = 200, description = "The entity with `ownerDetails` when the owner exists", body = ApiResponse),
        (status = 400, description = "Malformed id", body = ApiResponse),
        (status = 404, description = "Entity not found", body = ApiResponse)
    )
)]
pub async fn owner_handler(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<ApiResponse>, ApiError> {
    let model = resolve_model(&state, &kind)?;
    let joined = state.catalog.join_owner(model.as_ref(), &id).await?;
    Ok(Json(ApiResponse::ok(joined)))
}

#[utoipa::path(
    post,
    path = "/api/{kind}",
    params(
        ("kind" = String, Path, description = "nurseries | plants | products")
    ),
    request_body = EntityPayload,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Entity created", body = ApiResponse),
        (status = 400, description = "Invalid fields", body = ApiResponse),
        (status = 401, description = "Missing or unknown token", body = ApiResponse),
        (status = 403, description = "Role may not create this kind", body = ApiResponse),
        (status = 409, description = "Name already in use", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse)
    )
)]
pub async fn create_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    caller: Authenticated,
    request: Result<Json<EntityPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let model = resolve_model(&state, &kind)?;
    caller.require(model.managing_role(), &format!("create {}", model.collection()))?;
    let Json(EntityPayload(fields)) = match request {
        Ok(v) => v,
        Err(e) => return Ok(json_422(e, ENTITY_EXPECTED).into_response()),
    };

    let doc = state
        .catalog
        .create(model.as_ref(), &caller.0.subject, fields)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(doc))).into_response())
}

#[utoipa::path(
    patch,
    path = "/api/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "nurseries | plants | products"),
        ("id" = String, Path, description = "Entity id (UUID)")
    ),
    request_body = EntityPayload,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Updated entity", body = ApiResponse),
        (status = 400, description = "Invalid fields or id", body = ApiResponse),
        (status = 401, description = "Missing or unknown token", body = ApiResponse),
        (status = 403, description = "Role may not update this kind", body = ApiResponse),
        (status = 404, description = "Entity not found", body = ApiResponse),
        (status = 409, description = "Name already in use", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse)
    )
)]
pub async fn update_handler(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    caller: Authenticated,
    request: Result<Json<EntityPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let model = resolve_model(&state, &kind)?;
    if let Some(role) = model.updating_role() {
        caller.require(role, &format!("update {}", model.collection()))?;
    }
    let Json(EntityPayload(fields)) = match request {
        Ok(v) => v,
        Err(e) => return Ok(json_422(e, ENTITY_EXPECTED).into_response()),
    };

    let doc = state.catalog.update(model.as_ref(), &id, fields).await?;
    Ok(Json(ApiResponse::ok(doc)).into_response())
}

#[utoipa::path(
    delete,
    path = "/api/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "nurseries | plants | products"),
        ("id" = String, Path, description = "Entity id (UUID)")
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Entity deleted", body = ApiResponse),
        (status = 401, description = "Missing or unknown token", body = ApiResponse),
        (status = 403, description = "Role may not delete this kind", body = ApiResponse),
        (status = 404, description = "Entity not found", body = ApiResponse)
    )
)]
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    caller: Authenticated,
) -> Result<Json<ApiResponse>, ApiError> {
    let model = resolve_model(&state, &kind)?;
    caller.require(model.managing_role(), &format!("delete {}", model.collection()))?;
    state.catalog.delete(model.as_ref(), &id).await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({ "deleted": id }))))
}
