//! Request-boundary error taxonomy.
//!
//! Every handler failure is one of these kinds. Store failures are translated
//! at the handler boundary; internal causes are logged here and never leak
//! into response bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use parley_db::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed input — 400
    #[error("{0}")]
    Validation(String),

    /// Missing/invalid/expired credential — 401
    #[error("{0}")]
    Authentication(String),

    /// Authenticated but not authorized — 403
    #[error("{0}")]
    Forbidden(String),

    /// Entity or relationship absent — 404
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness or state conflict — 409
    #[error("{0}")]
    Conflict(String),

    /// Store or dependency failure — 500
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref cause) = self {
            error!("internal error: {:#}", cause);
        }
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

/// Default translation of store failures. Handlers override where the spec
/// demands a different kind (promote/demote of the creator is 400, not 403).
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::CreatorImmutable => {
                ApiError::Forbidden("the creator membership cannot be changed".into())
            }
            other => ApiError::Internal(anyhow::Error::new(other)),
        }
    }
}

/// IDs coming back out of the store are UUIDs we wrote; a parse failure
/// means corrupt storage, which is an internal error, not a client one.
pub(crate) fn parse_id(raw: &str) -> ApiResult<uuid::Uuid> {
    raw.parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt id '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_the_taxonomy() {
        let e: ApiError = StoreError::NotFound("group").into();
        assert!(matches!(e, ApiError::NotFound(_)));
        assert_eq!(e.status(), StatusCode::NOT_FOUND);

        let e: ApiError = StoreError::Conflict("already a member of this group".into()).into();
        assert_eq!(e.status(), StatusCode::CONFLICT);

        let e: ApiError = StoreError::CreatorImmutable.into();
        assert_eq!(e.status(), StatusCode::FORBIDDEN);

        let e: ApiError = StoreError::Poisoned.into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // Internal detail never reaches the body.
        assert_eq!(e.to_string(), "internal server error");
    }
}
