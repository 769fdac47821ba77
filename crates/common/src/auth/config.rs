/// Verification settings for customer access tokens. Tokens are issued by
/// the account service; this process only checks them.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
}

impl JwtConfig {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }
}
