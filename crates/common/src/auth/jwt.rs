use crate::auth::{AuthTokenProvider, JwtConfig};
use crate::domain::{DomainError, DomainResult};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
}

/// HS256 implementation of AuthTokenProvider
pub struct JwtAuthTokenProvider {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthTokenProvider {
    pub fn new(config: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }
}

impl AuthTokenProvider for JwtAuthTokenProvider {
    fn validate_token(&self, token: &str) -> DomainResult<String> {
        let token_data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| DomainError::InvalidToken(e.to_string()))?;

        Ok(token_data.claims.sub)
    }
}
