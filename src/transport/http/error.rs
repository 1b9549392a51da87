use crate::error::CatalogError;
use crate::transport::http::types::ApiResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unknown entity kind '{0}'")]
    UnknownKind(String),

    #[error("Missing or invalid bearer token")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownKind(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Catalog(e) => match e {
                CatalogError::InvalidArgument(_) | CatalogError::InvalidRating(_) => {
                    StatusCode::BAD_REQUEST
                }
                CatalogError::NotFound(_)
                | CatalogError::NotFoundEntity(_)
                | CatalogError::NotFoundReview { .. } => StatusCode::NOT_FOUND,
                CatalogError::DuplicateName { .. } | CatalogError::Conflict(_) => {
                    StatusCode::CONFLICT
                }
                CatalogError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Store failures are logged in full but not echoed to clients.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            if status == StatusCode::CONFLICT {
                warn!(error = %self, "Request conflicted");
            }
            self.to_string()
        };
        (status, Json(ApiResponse::failure(message))).into_response()
    }
}
