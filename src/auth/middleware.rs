// Authentication extractors for protected routes

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use uuid::Uuid;

use crate::auth::{error::AuthError, token::Role, token::TokenVerifier};

/// Authenticated customer extractor for protected routes
#[derive(Debug, Clone)]
pub struct AuthenticatedCustomer {
    pub customer_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthenticatedCustomer {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    fn from_parts(parts: &Parts) -> Result<Self, AuthError> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::InvalidToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidToken)?;

        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| AuthError::ConfigurationError("JWT_SECRET not configured".to_string()))?;

        let claims = TokenVerifier::new(secret).verify(token)?;

        Ok(AuthenticatedCustomer {
            customer_id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedCustomer
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_parts(parts)
    }
}

/// Extractor that additionally requires the Admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedCustomer);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedCustomer::from_parts(parts)?;
        if !user.is_admin() {
            tracing::warn!(
                customer_id = %user.customer_id,
                path = %parts.uri.path(),
                "admin route denied"
            );
            return Err(AuthError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
