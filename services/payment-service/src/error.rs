use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use crate::handlers::paystack_service::GatewayError;

// Struktur response error yang konsisten untuk semua endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// Enum untuk semua jenis error yang mungkin terjadi di payment service
#[derive(Debug)]
pub enum AppError {
    DatabaseError(sqlx::Error),
    ValidationError(String),
    UnauthorizedError(String),
    ForbiddenError(String),
    NotFoundError(String),
    ConflictError(String),
    GatewayError(GatewayError),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::UnauthorizedError(msg) => write!(f, "Unauthorized error: {}", msg),
            AppError::ForbiddenError(msg) => write!(f, "Forbidden error: {}", msg),
            AppError::NotFoundError(msg) => write!(f, "Not found: {}", msg),
            AppError::ConflictError(msg) => write!(f, "Conflict: {}", msg),
            AppError::GatewayError(e) => write!(f, "Gateway error: {}", e),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

// Konversi dari sqlx::Error ke AppError
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

// Konversi dari GatewayError ke AppError
impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::GatewayError(err)
    }
}

// Implementasi IntoResponse untuk AppError agar bisa langsung digunakan sebagai response di axum
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match &self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred",
                    debug_details(e.to_string()),
                )
            }
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg.as_str(),
                None,
            ),
            AppError::UnauthorizedError(msg) => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                msg.as_str(),
                None,
            ),
            AppError::ForbiddenError(msg) => (
                StatusCode::FORBIDDEN,
                "forbidden",
                msg.as_str(),
                None,
            ),
            AppError::NotFoundError(msg) => {
                (StatusCode::NOT_FOUND, "not_found", msg.as_str(), None)
            }
            AppError::ConflictError(msg) => {
                (StatusCode::CONFLICT, "conflict", msg.as_str(), None)
            }
            AppError::GatewayError(e) => {
                tracing::error!("Gateway error: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "settlement_unavailable",
                    "Settlement is temporarily unavailable, please retry",
                    debug_details(e.to_string()),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal server error occurred",
                    debug_details(msg.clone()),
                )
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
            details,
        };

        (status, Json(error_response)).into_response()
    }
}

// Detail teknis hanya ditampilkan di debug build
fn debug_details(details: String) -> Option<String> {
    if cfg!(debug_assertions) {
        Some(details)
    } else {
        None
    }
}

// Helper functions untuk membuat error dengan mudah
impl AppError {
    // Buat error validasi dengan pesan custom
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    // Buat error not found dengan pesan custom
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFoundError(msg.into())
    }

    // Buat error conflict (state payment tidak mengizinkan operasi)
    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::ConflictError(msg.into())
    }

    // Buat error internal dengan pesan custom
    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::InternalError(msg.into())
    }

    // Buat error unauthorized dengan pesan custom
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::UnauthorizedError(msg.into())
    }

    // Buat error forbidden (ownership mismatch) dengan pesan custom
    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::ForbiddenError(msg.into())
    }
}

// Type alias untuk Result dengan AppError sebagai error type
pub type AppResult<T> = Result<T, AppError>;
