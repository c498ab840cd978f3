use super::traits::AuthTokenProvider;
use crate::domain::{DomainError, DomainResult};
use axum::http::{header::AUTHORIZATION, HeaderMap};

/// User context extracted from authenticated requests
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: String,
}

/// Extract user context from the request's Authorization header
///
/// Expects a Bearer token and validates it with the provided AuthTokenProvider.
pub fn extract_user_context(
    headers: &HeaderMap,
    auth_token_provider: &dyn AuthTokenProvider,
) -> DomainResult<UserContext> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| DomainError::Unauthenticated("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| DomainError::Unauthenticated("Invalid authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .ok_or_else(|| {
            DomainError::Unauthenticated(
                "Invalid authorization format, expected 'Bearer <token>'".to_string(),
            )
        })?;

    let user_id = auth_token_provider.validate_token(token)?;

    Ok(UserContext { user_id })
}
