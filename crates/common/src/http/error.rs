use crate::domain::DomainError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

/// Map a domain error to its HTTP status
pub fn domain_error_status(error: &DomainError) -> StatusCode {
    match error {
        DomainError::InvalidIdentifier(_) | DomainError::ValidationError(_) => {
            StatusCode::BAD_REQUEST
        }
        DomainError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Unauthenticated(_) | DomainError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
        DomainError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Convert domain error to an HTTP response with a `{"error": ...}` body
pub fn domain_error_to_response(error: DomainError) -> Response {
    let status = domain_error_status(&error);

    let message = match &error {
        DomainError::StorageUnavailable(source) => {
            error!(error = ?source, "storage unavailable");
            "Storage temporarily unavailable, retry later".to_string()
        }
        other => other.to_string(),
    };

    (status, Json(json!({ "error": message }))).into_response()
}

/// Handler error wrapper so handlers can use `?` on domain results
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        domain_error_to_response(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            domain_error_status(&DomainError::InvalidIdentifier("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            domain_error_status(&DomainError::ValidationError("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            domain_error_status(&DomainError::DeviceNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            domain_error_status(&DomainError::InvalidToken("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            domain_error_status(&DomainError::StorageUnavailable(anyhow::anyhow!("down"))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_storage_error_body_hides_details() {
        let response =
            domain_error_to_response(DomainError::StorageUnavailable(anyhow::anyhow!("pg at 10.0.0.3")));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("10.0.0.3"));
    }
}
