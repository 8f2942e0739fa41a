// JWT-Only Authentication Middleware untuk Payment Service

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use shared::models::{Role, TokenClaims};
use shared::utils::jwt::{decode_access_token, extract_bearer_token};
use sqlx::PgPool;
use crate::{config::AppState, error::AppError};

// Authentication context untuk user yang sudah terautentikasi
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
    pub role: Role,
}

impl From<TokenClaims> for AuthUser {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

impl AuthUser {
    // Guard untuk endpoint khusus tenant (process, checkout)
    pub fn require_tenant(&self) -> Result<(), AppError> {
        match self.role {
            Role::Tenant => Ok(()),
            Role::Landlord => Err(AppError::forbidden("Only tenants can settle payments")),
        }
    }

    // Guard untuk endpoint khusus landlord (update, delete)
    pub fn require_landlord(&self) -> Result<(), AppError> {
        match self.role {
            Role::Landlord => Ok(()),
            Role::Tenant => Err(AppError::forbidden("Only landlords can modify payments")),
        }
    }
}

// Axum extractor implementation untuk AuthUser
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

// Cek apakah token sudah di-blacklist menggunakan secure function
async fn is_blacklisted(pool: &PgPool, claims: &TokenClaims) -> Result<bool, sqlx::Error> {
    let blacklisted = sqlx::query_scalar::<_, Option<bool>>("SELECT is_token_blacklisted_v2($1, $2)")
        .bind(&claims.jti)
        .bind(&claims.token_type)
        .fetch_one(pool)
        .await?;

    // NULL dianggap blacklisted
    Ok(blacklisted.unwrap_or(true))
}

// JWT authentication middleware dengan blacklist validation
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Authorization header dengan Bearer token diperlukan"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Invalid Authorization header format"))?;

    let token = extract_bearer_token(header)
        .ok_or_else(|| AppError::unauthorized("Bearer token format diperlukan"))?;

    let claims = decode_access_token(token, &state.config.jwt_secret)
        .map_err(|e| {
            tracing::debug!("JWT rejected: {}", e);
            AppError::unauthorized("Token tidak valid atau expired")
        })?;

    let blacklisted = is_blacklisted(&state.db, &claims).await.map_err(|e| {
        tracing::error!("Blacklist check failed: {}", e);
        AppError::unauthorized("Token tidak dapat divalidasi")
    })?;

    if blacklisted {
        return Err(AppError::unauthorized("Token sudah di-blacklist"));
    }

    let auth_user = AuthUser::from(claims);

    // Security audit log
    tracing::debug!(
        "User authenticated - ID: {}, Role: {}, Endpoint: {} {}",
        auth_user.user_id,
        auth_user.role,
        request.method(),
        request.uri().path()
    );

    // Inject ke request extensions agar bisa di-extract oleh handlers
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}
