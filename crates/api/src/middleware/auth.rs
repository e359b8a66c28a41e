//! Authentication extractors.
//!
//! Shop owners authenticate with an HS256 bearer token issued by the auth
//! service. The token names the user and its role; the shop is the one the
//! user owns.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use easycart_core::{UserId, UserRole};

use crate::db::ShopRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::Shop;
use crate::state::AppState;

/// Claims carried by a shop-owner bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: UserId,
    pub role: UserRole,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
}

/// Extract and verify the bearer token of a request.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` if the header is missing or malformed, or
/// the token fails verification (signature, algorithm, expiry).
pub fn verify_bearer(headers: &HeaderMap, key: &DecodingKey) -> Result<Claims, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_owned()))?;

    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            AppError::Unauthorized("invalid token".to_owned())
        })
}

/// Extractor that requires an authenticated shop owner.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireShopOwner { shop, .. }: RequireShopOwner) -> String {
///     shop.name
/// }
/// ```
pub struct RequireShopOwner {
    pub user_id: UserId,
    pub shop: Shop,
}

impl FromRequestParts<AppState> for RequireShopOwner {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = verify_bearer(&parts.headers, state.jwt_key())?;

        if !claims.role.can_manage_shop() {
            return Err(AppError::Forbidden(format!(
                "role {} cannot manage a shop",
                claims.role
            )));
        }

        let shop = ShopRepository::new(state.pool())
            .find_by_owner(claims.sub)
            .await?
            .ok_or_else(|| AppError::NotFound("shop".to_owned()))?;

        set_sentry_user(&claims.sub);
        tracing::Span::current().record("shop_id", tracing::field::display(shop.id));

        Ok(Self {
            user_id: claims.sub,
            shop,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    const SECRET: &[u8] = b"kX9#mP2$vL5@nQ8&wR3*jT6!hY0^bF4%";

    fn token(role: UserRole, exp: u64, secret: &[u8]) -> String {
        let claims = Claims {
            sub: UserId::new_v4(),
            role,
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    fn future_exp() -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap() + 3600
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_valid_token() {
        let headers = headers_with(&format!(
            "Bearer {}",
            token(UserRole::Manager, future_exp(), SECRET)
        ));
        let claims = verify_bearer(&headers, &DecodingKey::from_secret(SECRET)).unwrap();
        assert_eq!(claims.role, UserRole::Manager);
    }

    #[test]
    fn test_missing_header() {
        let result = verify_bearer(&HeaderMap::new(), &DecodingKey::from_secret(SECRET));
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_wrong_scheme() {
        let headers = headers_with(&format!(
            "Basic {}",
            token(UserRole::Manager, future_exp(), SECRET)
        ));
        let result = verify_bearer(&headers, &DecodingKey::from_secret(SECRET));
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_wrong_secret() {
        let headers = headers_with(&format!(
            "Bearer {}",
            token(UserRole::Manager, future_exp(), b"another-secret-entirely-0123456789")
        ));
        let result = verify_bearer(&headers, &DecodingKey::from_secret(SECRET));
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_expired_token() {
        let headers = headers_with(&format!("Bearer {}", token(UserRole::Admin, 1_000, SECRET)));
        let result = verify_bearer(&headers, &DecodingKey::from_secret(SECRET));
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }
}
