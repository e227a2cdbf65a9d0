use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tenancy::{self, DbKey};

use super::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id (UUID, stored as string in JWT)
    pub sub: Uuid,
    pub username: String,
    pub role: Option<String>,
    pub is_superuser: bool,
    /// School the user belongs to; selects the tenant database.
    pub school_id: Option<i32>,
    /// Unix timestamp expiry
    pub exp: u64,
}

impl Claims {
    pub fn is_school_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

pub fn encode_jwt(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

pub fn extract_bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn claims_from_parts(parts: &Parts, secret: &str) -> Result<Claims, (StatusCode, &'static str)> {
    let token = extract_bearer(parts).ok_or((
        StatusCode::UNAUTHORIZED,
        "Missing or invalid Authorization header",
    ))?;
    decode_jwt(token, secret).map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid or expired token"))
}

/// Extractor: validates Bearer token, requires is_superuser == true.
pub struct SuperAdminClaims(pub Claims);

impl<S> FromRequestParts<S> for SuperAdminClaims
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let claims = claims_from_parts(parts, &state.jwt_secret)?;

        if !claims.is_superuser {
            return Err((StatusCode::FORBIDDEN, "Superadmin access required"));
        }

        Ok(SuperAdminClaims(claims))
    }
}

/// Extractor: validates Bearer token (any authenticated user).
pub struct AuthClaims(pub Claims);

impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let claims = claims_from_parts(parts, &state.jwt_secret)?;
        Ok(AuthClaims(claims))
    }
}

/// Extractor: a school user whose tenant database has been selected for
/// this request.
pub struct TenantClaims {
    pub claims: Claims,
    pub school_id: i32,
    pub db_key: DbKey,
}

impl<S> FromRequestParts<S> for TenantClaims
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let claims = claims_from_parts(parts, &state.jwt_secret)?;

        let school_id = claims
            .school_id
            .ok_or((StatusCode::FORBIDDEN, "School account required"))?;
        let db_key = tenancy::active_tenant().ok_or((
            StatusCode::SERVICE_UNAVAILABLE,
            "School database is not available",
        ))?;

        Ok(TenantClaims {
            claims,
            school_id,
            db_key,
        })
    }
}
