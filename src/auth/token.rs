// Bearer token verification
//
// Identity is issued by an external provider; this service only validates
// the signed claims it hands us. No tokens are minted here.

use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Customer,
    Admin,
}

/// Claims carried by the external provider's access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Stable customer/user id.
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: i64,
}

/// Verifier for externally issued access tokens.
pub struct TokenVerifier {
    secret: String,
}

impl TokenVerifier {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Validate signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::default();

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn make_token(secret: &str, role: Role, exp_offset: i64) -> String {
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "customer@example.com".to_string(),
            role,
            exp: chrono::Utc::now().timestamp() + exp_offset,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_round_trips() {
        let verifier = TokenVerifier::new("test-secret".to_string());
        let token = make_token("test-secret", Role::Customer, 3600);
        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.email, "customer@example.com");
        assert_eq!(claims.role, Role::Customer);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = TokenVerifier::new("test-secret".to_string());
        let token = make_token("other-secret", Role::Customer, 3600);
        assert!(matches!(
            verifier.verify(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = TokenVerifier::new("test-secret".to_string());
        let token = make_token("test-secret", Role::Customer, -3600);
        assert!(matches!(
            verifier.verify(&token),
            Err(AuthError::ExpiredToken)
        ));
    }
}
