use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::models::Identity;
use crate::shared::AppError;

/// JWT claims carried by connection tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub user_id: i64,
    pub username: String,
    pub exp: usize, // Expiration timestamp (standard JWT claim)
    pub iat: usize, // Issued at timestamp (standard JWT claim)
}

/// Resolves a connection token to the identity it was issued for
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, AppError>;
}

/// HS256 token verifier/issuer
#[derive(Clone)]
pub struct JwtTokenVerifier {
    secret: String,
    pub expiration_days: i64,
}

impl JwtTokenVerifier {
    pub fn new(secret: impl Into<String>, expiration_days: i64) -> Self {
        Self {
            secret: secret.into(),
            expiration_days,
        }
    }

    /// Creates a new JWT token for the given identity
    #[instrument(skip(self, identity), fields(user_id = identity.user_id))]
    pub fn create_token(&self, identity: &Identity) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = (now + Duration::days(self.expiration_days)).timestamp() as usize;

        debug!(
            expiration_days = self.expiration_days,
            exp_timestamp = exp,
            "Creating JWT token with expiration"
        );

        let claims = TokenClaims {
            user_id: identity.user_id,
            username: identity.username.clone(),
            exp,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| {
            debug!(error = %e, "Failed to encode JWT token");
            AppError::JwtError(e.to_string())
        })
    }

    /// Validates a JWT token and returns the claims if valid
    #[instrument(skip(self, token))]
    pub fn validate_token(&self, token: &str) -> Result<TokenClaims, AppError> {
        decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| {
            debug!(
                username = %data.claims.username,
                user_id = data.claims.user_id,
                exp = data.claims.exp,
                "JWT token decoded successfully"
            );
            data.claims
        })
        .map_err(|e| {
            debug!(error = %e, "Failed to decode JWT token");
            AppError::JwtError(e.to_string())
        })
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AppError> {
        let claims = self.validate_token(token)?;
        Ok(Identity::new(claims.user_id, claims.username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> JwtTokenVerifier {
        JwtTokenVerifier::new("test-secret", 1)
    }

    #[tokio::test]
    async fn test_create_and_verify_token() {
        let verifier = verifier();
        let identity = Identity::new(7, "alice");

        let token = verifier.create_token(&identity).unwrap();
        assert!(!token.is_empty());

        let claims = verifier.validate_token(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > claims.iat);

        assert_eq!(verifier.verify(&token).await.unwrap(), identity);
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let result = verifier().verify("invalid.token.here").await;
        assert!(matches!(result, Err(AppError::JwtError(_))));
    }

    #[test]
    fn test_token_with_different_secret_is_rejected() {
        let issuer = JwtTokenVerifier::new("one-secret", 1);
        let other = JwtTokenVerifier::new("another-secret", 1);

        let token = issuer.create_token(&Identity::new(1, "bob")).unwrap();

        assert!(issuer.validate_token(&token).is_ok());
        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let verifier = JwtTokenVerifier::new("test-secret", -1);
        let token = verifier.create_token(&Identity::new(1, "bob")).unwrap();

        assert!(matches!(
            verifier.validate_token(&token),
            Err(AppError::JwtError(_))
        ));
    }
}
