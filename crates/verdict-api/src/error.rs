use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

use verdict_db::StoreError;

/// Request-boundary error taxonomy. Everything here is recovered into a
/// structured response; nothing is process-fatal.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad or duplicate input, attributed to a field. 400.
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// Anonymous caller on an endpoint that needs an identity. 401.
    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated caller without the role/ownership to act. 403.
    #[error("permission denied")]
    Forbidden,

    /// 404.
    #[error("not found")]
    NotFound,

    /// Uniqueness violation surfaced from storage. 409.
    #[error("{message}")]
    Conflict {
        field: &'static str,
        message: String,
    },

    /// Anything unexpected. Logged; the response body stays opaque. 500.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { field } => ApiError::Conflict {
                field,
                message: format!("{} already exists", field),
            },
            StoreError::BadReference { field } => ApiError::Validation {
                field,
                message: format!("unknown {}", field),
            },
            StoreError::NotFound => ApiError::NotFound,
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation { field, message } => {
                (StatusCode::BAD_REQUEST, field_body(field, message))
            }
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                json!({ "detail": "authentication credentials were not provided" }),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "detail": "you do not have permission to perform this action" }),
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, json!({ "detail": "not found" })),
            ApiError::Conflict { field, message } => {
                (StatusCode::CONFLICT, field_body(field, message))
            }
            ApiError::Internal(err) => {
                error!("internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Field-keyed error body, e.g. `{"username": "\"me\" is reserved"}`.
fn field_body(field: &str, message: &str) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(field.to_string(), Value::String(message.to_string()));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_map_to_409() {
        let err: ApiError = StoreError::Conflict { field: "review" }.into();
        assert!(matches!(err, ApiError::Conflict { field: "review", .. }));
    }

    #[test]
    fn bad_references_map_to_field_validation() {
        let err: ApiError = StoreError::BadReference { field: "genre" }.into();
        match err {
            ApiError::Validation { field, .. } => assert_eq!(field, "genre"),
            other => panic!("unexpected mapping: {:?}", other),
        }
    }
}
