// Middleware modules untuk Payment Service
pub mod auth;
pub mod rate_limit;
