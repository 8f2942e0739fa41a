// Payment Service Configuration
use sqlx::{postgres::PgConnectOptions, postgres::PgPoolOptions, PgPool};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::handlers::paystack_service::{PaymentGateway, PaystackService};
use crate::middleware::rate_limit::RateLimiter;
use crate::repositories::{LeaseRepository, NotificationRepository, PaymentRepository, TransactionRepository};
use crate::services::{CallbackReconciler, PaymentService};

// Konfigurasi aplikasi dari environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub jwt_secret: String,
    pub paystack_secret_key: String,
    pub paystack_api_url: String,
    pub paystack_callback_url: String,
    pub gateway_timeout: Duration,
    pub sweep_interval: Duration,
    pub sweep_min_age: chrono::Duration,
    pub frontend_url: String,
    pub redis_url: String,
    pub app_version: String,
}

impl AppConfig {
    // Load konfigurasi dari environment dengan validasi
    pub fn from_env() -> Result<Self, String> {
        let jwt_secret = required("JWT_SECRET")?;
        if !cfg!(debug_assertions) && jwt_secret.contains("change-this") {
            return Err("JWT_SECRET masih default! Ganti untuk production".to_string());
        }

        let server_port = required("PAYMENT_SERVICE_PORT")?
            .parse()
            .map_err(|_| "PAYMENT_SERVICE_PORT harus berupa angka port".to_string())?;

        Ok(AppConfig {
            database_url: required("DATABASE_URL")?,
            server_host: required("PAYMENT_SERVICE_HOST")?,
            server_port,
            environment: required("RUST_ENV")?,
            jwt_secret,
            paystack_secret_key: required("PAYSTACK_SECRET_KEY")?,
            paystack_api_url: env::var("PAYSTACK_API_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            paystack_callback_url: required("PAYSTACK_CALLBACK_URL")?,
            gateway_timeout: Duration::from_secs(parsed_or("GATEWAY_TIMEOUT_SECS", 30)?),
            sweep_interval: Duration::from_secs(parsed_or("PENDING_SWEEP_INTERVAL_SECS", 900)?),
            sweep_min_age: chrono::Duration::minutes(parsed_or("PENDING_SWEEP_MIN_AGE_MINS", 30)?),
            frontend_url: required("FRONTEND_URL")?,
            redis_url: required("REDIS_URL")?,
            app_version: env::var("APP_VERSION").unwrap_or_else(|_| "1.0.0".to_string()),
        })
    }

    // Helper cek production mode
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    // Paystack test key diawali sk_test_
    pub fn gateway_mode(&self) -> &'static str {
        if self.paystack_secret_key.starts_with("sk_live_") {
            "live"
        } else {
            "test"
        }
    }
}

fn required(key: &str) -> Result<String, String> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| format!("{} harus diset di environment", key))
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| format!("{} tidak valid: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

// Inisialisasi database connection pool
pub async fn init_db_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    tracing::info!("🔌 Initializing Payment Service database connection...");

    // Parse connection options dan disable prepared statements
    let options = PgConnectOptions::from_str(database_url)?
        .statement_cache_capacity(0);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(3)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect_with(options)
        .await?;

    tracing::info!("✅ Payment Service database pool initialized");
    Ok(pool)
}

// Health check database connection
pub async fn check_db_health(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1")
        .fetch_optional(pool)
        .await
        .is_ok()
}

// Application state yang di-share ke semua handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: AppConfig,
    pub payments: Arc<PaymentService>,
    pub reconciler: Arc<CallbackReconciler>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub rate_limiter: RateLimiter,
}

impl axum::extract::FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl axum::extract::FromRef<AppState> for RateLimiter {
    fn from_ref(state: &AppState) -> Self {
        state.rate_limiter.clone()
    }
}

impl AppState {
    // Inisialisasi application state: pool, migrasi, gateway, orchestrator
    pub async fn new(config: AppConfig) -> Result<Self, String> {
        let db = init_db_pool(&config.database_url)
            .await
            .map_err(|e| format!("Failed to init database: {}", e))?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .map_err(|e| format!("Failed to run migrations: {}", e))?;

        let gateway: Arc<dyn PaymentGateway> = Arc::new(
            PaystackService::new(
                config.paystack_secret_key.clone(),
                config.paystack_api_url.clone(),
                config.paystack_callback_url.clone(),
                config.gateway_timeout,
            )
            .map_err(|e| format!("Failed to create Paystack client: {}", e))?,
        );

        tracing::info!("🔄 Initializing Redis rate limiter...");
        let rate_limiter = RateLimiter::new(&config.redis_url)
            .map_err(|e| format!("Failed to initialize Redis rate limiter: {}", e))?;

        Ok(Self::assemble(db, config, gateway, rate_limiter))
    }

    /// Rakit orchestrator dan reconciler di atas repository Postgres
    pub fn assemble(
        db: PgPool,
        config: AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        rate_limiter: RateLimiter,
    ) -> Self {
        let payments = Arc::new(PaymentService::new(
            Arc::new(PaymentRepository::new(db.clone())),
            Arc::new(TransactionRepository::new(db.clone())),
            Arc::new(LeaseRepository::new(db.clone())),
            Arc::new(NotificationRepository::new(db.clone())),
            gateway.clone(),
        ));

        let reconciler = Arc::new(CallbackReconciler::new(payments.clone(), gateway.clone()));

        AppState {
            db,
            config,
            payments,
            reconciler,
            gateway,
            rate_limiter,
        }
    }

    // Inisialisasi application state dari environment
    pub async fn from_env() -> Result<Self, String> {
        let config = AppConfig::from_env()?;
        Self::new(config).await
    }

    // Health check semua dependencies
    pub async fn health_check(&self) -> HealthStatus {
        let db_healthy = check_db_health(&self.db).await;

        HealthStatus {
            database: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
            overall: if db_healthy { "healthy" } else { "degraded" }.to_string(),
        }
    }
}

// Response untuk health check endpoint
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct HealthStatus {
    pub database: String,
    pub overall: String,
}
