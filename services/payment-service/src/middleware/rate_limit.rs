// Redis-based Rate Limiting Middleware untuk Payment Service

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    middleware::Next,
};
use redis::{AsyncCommands, Client};
use serde::Serialize;
use shared::models::Role;
use std::env;
use thiserror::Error;
use uuid::Uuid;

use crate::middleware::auth::AuthUser;

// Konfigurasi rate limit dari environment variables
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub user_requests_per_window: u32,
    pub settlement_requests_per_window: u32,
    pub webhook_requests_per_window: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            user_requests_per_window: 300,
            settlement_requests_per_window: 30,
            webhook_requests_per_window: 600,
            window_seconds: 3600,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            user_requests_per_window: env_or("RATE_LIMIT_USER_REQUESTS", defaults.user_requests_per_window),
            settlement_requests_per_window: env_or(
                "RATE_LIMIT_SETTLEMENT_REQUESTS",
                defaults.settlement_requests_per_window,
            ),
            webhook_requests_per_window: env_or("RATE_LIMIT_WEBHOOK_REQUESTS", defaults.webhook_requests_per_window),
            window_seconds: defaults.window_seconds,
        }
    }

    /// Batas request per window untuk satu endpoint.
    ///
    /// Process dan checkout menggerakkan uang, jadi batasnya paling ketat.
    pub fn limit_for(&self, role: Option<Role>, method: &Method, path: &str) -> (&'static str, u32) {
        if path.starts_with("/api/webhooks") {
            return ("webhook", self.webhook_requests_per_window);
        }

        let is_settlement = method == Method::POST && (path.ends_with("/process") || path.ends_with("/checkout"));
        if is_settlement {
            return ("settlement", self.settlement_requests_per_window);
        }

        match role {
            Some(_) => ("general", self.user_requests_per_window),
            None => ("general", 100),
        }
    }
}

fn env_or(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

// Rate limiter menggunakan Redis sorted set untuk sliding window
#[derive(Clone)]
pub struct RateLimiter {
    redis_client: Client,
    config: RateLimitConfig,
}

impl RateLimiter {
    // Buat rate limiter baru. Koneksi dibuka lazily per request.
    pub fn new(redis_url: &str) -> Result<Self, RateLimitError> {
        let redis_client = Client::open(redis_url).map_err(RateLimitError::RedisConnection)?;

        Ok(Self {
            redis_client,
            config: RateLimitConfig::from_env(),
        })
    }

    // Cek rate limit untuk identifier dan endpoint tertentu
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        bucket: &str,
        max_requests: u32,
    ) -> Result<RateLimitResult, RateLimitError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection()
            .await
            .map_err(RateLimitError::RedisConnection)?;

        let window_key = format!("rate_limit:payment:{}:{}", identifier, bucket);
        let now_ms = chrono::Utc::now().timestamp_millis();
        let window_ms = (self.config.window_seconds * 1000) as i64;
        let window_start = now_ms - window_ms;

        // Clean old entries di luar time window
        let _: () = conn
            .zrembyscore(&window_key, "-inf", window_start)
            .await
            .map_err(RateLimitError::RedisOperation)?;

        // Hitung request dalam window
        let current_count: u32 = conn
            .zcard(&window_key)
            .await
            .map_err(RateLimitError::RedisOperation)?;

        // Member unik supaya request dalam milidetik yang sama tetap terhitung
        let member = format!("{}-{}", now_ms, Uuid::new_v4().simple());
        let _: () = conn
            .zadd(&window_key, member, now_ms)
            .await
            .map_err(RateLimitError::RedisOperation)?;

        // Set expiration untuk automatic cleanup
        let _: () = conn
            .expire(&window_key, self.config.window_seconds as i64)
            .await
            .map_err(RateLimitError::RedisOperation)?;

        let allowed = current_count < max_requests;

        Ok(RateLimitResult {
            allowed,
            current_count: current_count + 1,
            max_requests,
            remaining: if allowed { max_requests.saturating_sub(current_count + 1) } else { 0 },
            reset_time: ((now_ms + window_ms) / 1000) as u64,
        })
    }
}

// Hasil rate limit check dengan detail info
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub current_count: u32,
    pub max_requests: u32,
    pub remaining: u32,
    pub reset_time: u64,
}

// Error types untuk rate limiting
#[derive(Error, Debug)]
pub enum RateLimitError {
    #[error("Redis connection error: {0}")]
    RedisConnection(redis::RedisError),

    #[error("Redis operation error: {0}")]
    RedisOperation(redis::RedisError),
}

// Axum middleware untuk rate limiting. Harus dipasang setelah auth supaya AuthUser terbaca.
pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let auth_user = request.extensions().get::<AuthUser>();
    let identifier = extract_identifier(auth_user, &request);
    let role = auth_user.map(|user| user.role);

    let path = request.uri().path().to_string();
    let (bucket, max_requests) = rate_limiter.config.limit_for(role, request.method(), &path);

    match rate_limiter.check_rate_limit(&identifier, bucket, max_requests).await {
        Ok(result) if result.allowed => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();

            headers.insert("X-RateLimit-Limit", HeaderValue::from(result.max_requests));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));
            headers.insert("X-RateLimit-Reset", HeaderValue::from(result.reset_time));

            response
        }
        Ok(result) => {
            tracing::warn!(
                "Rate limit exceeded: identifier={}, path={}, count={}/{}",
                identifier, path, result.current_count, result.max_requests
            );

            let error_response = axum::Json(serde_json::json!({
                "success": false,
                "error": "rate_limit_exceeded",
                "message": "Terlalu banyak permintaan. Silakan coba lagi nanti."
            }));

            (StatusCode::TOO_MANY_REQUESTS, error_response).into_response()
        }
        Err(e) => {
            // Redis error - fail open untuk tidak block user
            tracing::error!("Rate limiting error: {}. Fail open.", e);
            next.run(request).await
        }
    }
}

// Extract client identifier untuk rate limiting (user ID atau IP)
fn extract_identifier(auth_user: Option<&AuthUser>, request: &Request) -> String {
    if let Some(user) = auth_user {
        return format!("user:{}", user.user_id);
    }

    request
        .headers()
        .get("x-forwarded-for")
        .or_else(|| request.headers().get("x-real-ip"))
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| format!("ip:{}", s.trim()))
        .unwrap_or_else(|| "ip:unknown".to_string())
}
