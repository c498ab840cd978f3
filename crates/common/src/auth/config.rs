/// Configuration for validating bearer tokens issued by the identity provider
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// Tolerated clock skew in seconds when checking `exp`
    pub leeway_secs: u64,
}

impl JwtConfig {
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            leeway_secs: 60,
        }
    }
}
