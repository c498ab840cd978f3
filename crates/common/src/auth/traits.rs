use crate::domain::DomainResult;

/// Validates access tokens presented by operators. Issuing tokens is the job
/// of an external identity provider.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait AuthTokenProvider: Send + Sync {
    /// Validate an access token and return the subject (user id)
    fn validate_token(&self, token: &str) -> DomainResult<String>;
}
