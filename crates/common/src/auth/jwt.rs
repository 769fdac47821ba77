use crate::auth::{AuthTokenProvider, JwtConfig};
use crate::domain::DenialReason;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by a customer access token
#[derive(Debug, Serialize, Deserialize)]
pub struct CustomerClaims {
    pub customer_id: String,
    pub exp: i64, // expiration timestamp
    pub iat: i64, // issued at timestamp
}

/// HS256 implementation of AuthTokenProvider
pub struct JwtAuthTokenProvider {
    config: JwtConfig,
    validation: Validation,
}

impl JwtAuthTokenProvider {
    pub fn new(config: JwtConfig) -> Self {
        Self {
            config,
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl AuthTokenProvider for JwtAuthTokenProvider {
    fn validate_token(&self, token: &str) -> Result<Uuid, DenialReason> {
        let token_data = decode::<CustomerClaims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &self.validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => DenialReason::TokenExpired,
            ErrorKind::InvalidSignature => DenialReason::BadSignature,
            _ => DenialReason::TokenMalformed,
        })?;

        Uuid::parse_str(&token_data.claims.customer_id).map_err(|_| DenialReason::TokenMalformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn test_config() -> JwtConfig {
        JwtConfig::new("test-secret-key".to_string())
    }

    fn valid_claims(customer_id: Uuid) -> CustomerClaims {
        let now = chrono::Utc::now().timestamp();
        CustomerClaims {
            customer_id: customer_id.to_string(),
            exp: now + 3600,
            iat: now,
        }
    }

    fn sign(claims: &CustomerClaims, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let customer_id = Uuid::new_v4();

        let token = sign(&valid_claims(customer_id), "test-secret-key");

        assert_eq!(provider.validate_token(&token), Ok(customer_id));
    }

    #[test]
    fn test_expired_token() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let now = chrono::Utc::now().timestamp();
        let token = sign(
            &CustomerClaims {
                customer_id: Uuid::new_v4().to_string(),
                exp: now - 3600,
                iat: now - 7200,
            },
            "test-secret-key",
        );

        assert_eq!(
            provider.validate_token(&token),
            Err(DenialReason::TokenExpired)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let token = sign(&valid_claims(Uuid::new_v4()), "other-secret");

        assert_eq!(
            provider.validate_token(&token),
            Err(DenialReason::BadSignature)
        );
    }

    #[test]
    fn test_garbage_token() {
        let provider = JwtAuthTokenProvider::new(test_config());
        assert_eq!(
            provider.validate_token("not-a-jwt"),
            Err(DenialReason::TokenMalformed)
        );
    }

    #[test]
    fn test_customer_id_must_be_uuid() {
        let provider = JwtAuthTokenProvider::new(test_config());
        let now = chrono::Utc::now().timestamp();
        let token = sign(
            &CustomerClaims {
                customer_id: "customer-1".to_string(),
                exp: now + 3600,
                iat: now,
            },
            "test-secret-key",
        );

        assert_eq!(
            provider.validate_token(&token),
            Err(DenialReason::TokenMalformed)
        );
    }
}
