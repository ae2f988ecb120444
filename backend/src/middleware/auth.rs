//! Authentication middleware
//!
//! Verifies the bearer token issued by the identity provider and turns its
//! claims into the [`Actor`] every ledger operation is called with. Role
//! checks happen in the services, against the permission table.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared::models::{Actor, Role};

use crate::error::AppError;
use crate::AppState;

/// Authenticated caller extracted from the JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub actor: Actor,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Internal user or admin id
    pub sub: String,
    /// Identity at the provider
    pub ext: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|header| header.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let actor = match decode_jwt(token, &state.config.jwt.secret) {
        Ok(actor) => actor,
        Err(msg) => return unauthorized_response(&msg),
    };

    request.extensions_mut().insert(AuthUser { actor });

    next.run(request).await
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Actor, String> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))?;

    let id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token".to_string())?;
    let role = Role::parse(&claims.role).ok_or_else(|| "Unknown role in token".to_string())?;
    if claims.ext.trim().is_empty() {
        return Err("Missing external identity in token".to_string());
    }

    Ok(Actor::new(id, claims.ext, role))
}

/// Sign a token for `actor` that expires after `ttl_secs`
///
/// Tokens are normally minted by the identity provider; this is for local
/// tooling and tests that share its secret.
pub fn sign_token(actor: &Actor, secret: &str, ttl_secs: i64) -> Result<String, AppError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: actor.id.to_string(),
        ext: actor.external_id.clone(),
        role: actor.role.as_str().to_string(),
        exp: now + ttl_secs,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    AppError::Unauthorized(message.to_string()).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the calling actor
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

impl CurrentUser {
    pub fn actor(&self) -> &Actor {
        &self.0.actor
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}
