// API Routes untuk Payment Service dengan JWT-Only architecture

use crate::config::AppState;
use crate::handlers::{payment_handler, transaction_handler, webhook_handler};
use crate::middleware::{auth::jwt_auth_middleware, rate_limit::rate_limit_middleware};
use axum::{
    extract::Request,
    http::{header::HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

// OpenAPI Documentation untuk Payment Service
#[derive(OpenApi)]
#[openapi(
    paths(
        payment_handler::create_payment,
        payment_handler::list_payments,
        payment_handler::get_payment,
        payment_handler::update_payment,
        payment_handler::delete_payment,
        payment_handler::process_payment,
        payment_handler::checkout_payment,
        payment_handler::health_check,
        payment_handler::get_service_info,
        transaction_handler::list_transactions,
        transaction_handler::get_transaction,
        webhook_handler::paystack_webhook,
    ),
    components(
        schemas(
            crate::domain::payment::CreatePaymentRequest,
            crate::domain::payment::UpdatePaymentRequest,
            crate::domain::payment::PaymentDetails,
            crate::domain::payment::Payment,
            crate::domain::payment::PaymentStatus,
            crate::domain::payment::PaymentType,
            crate::domain::payment::CheckoutResponse,
            crate::domain::payment::WebhookResponse,
            crate::domain::transaction::Transaction,
            crate::domain::transaction::TransactionType,
            crate::domain::transaction::TransactionStatus,
        )
    ),
    tags(
        (name = "Payment Service", description = "Rent payment creation and settlement"),
        (name = "Transaction Ledger", description = "Immutable record of settled payments")
    ),
    info(
        title = "Payment Service API",
        description = "Rent payment settlement between tenants and landlords\n\n## Features\n\n- 💳 Direct settlement and Paystack checkout\n- 🔏 HMAC-SHA512 signed webhooks\n- 📒 Exactly-once transaction ledger\n- 🔒 JWT-Only authentication\n- 🌐 Redis-based rate limiting",
        version = "1.0.0"
    ),
    modifiers(&SecurityAddon),
    security(
        ("bearer_auth" = [])
    )
)]
pub struct ApiDoc;

// Security scheme modifier untuk Bearer JWT authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

// Security headers middleware
async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static(
            "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data: https:; font-src 'self'; connect-src 'self'; frame-ancestors 'none';",
        ),
    );
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("strict-origin-when-cross-origin"));
    headers.insert("Strict-Transport-Security", HeaderValue::from_static("max-age=31536000; includeSubDomains"));

    response
}

// Buat router dengan JWT-only security dan Redis rate limiting
pub fn create_routes(state: AppState) -> Result<Router, String> {
    if state.config.is_production() {
        tracing::warn!("Payment Service running in PRODUCTION mode");
    } else {
        tracing::info!("Payment Service running in DEVELOPMENT mode");
    }

    // CORS hanya untuk frontend
    let allowed_origin = state.config.frontend_url.parse::<HeaderValue>()
        .map_err(|_| format!("FRONTEND_URL bukan origin yang valid: {}", state.config.frontend_url))?;

    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
            axum::http::header::CONTENT_TYPE,
        ])
        .allow_credentials(false)
        .max_age(Duration::from_secs(86400));

    // Public routes - tanpa JWT authentication
    let public_routes = Router::new()
        .route("/health", get(payment_handler::health_check))
        .route("/info", get(payment_handler::get_service_info))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // Webhook: signature-checked, rate limited per IP
    let webhook_routes = Router::new()
        .route("/api/webhooks/paystack", post(webhook_handler::paystack_webhook))
        .route_layer(axum::middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    // Protected API routes. Layer terakhir jalan pertama: auth dulu, lalu rate limit per user.
    let protected_routes = build_api_routes()
        .route_layer(axum::middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_middleware,
        ));

    // Combine semua routes dengan shared middleware
    let router = public_routes
        .merge(webhook_routes)
        .nest("/api", protected_routes)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(30)))
                .layer(cors),
        )
        .layer(axum::middleware::from_fn(security_headers_middleware));

    Ok(router)
}

// Build API routes dengan JWT authentication
fn build_api_routes() -> Router<AppState> {
    Router::new()
        // ===== Payment Operations =====
        .route(
            "/payments",
            get(payment_handler::list_payments).post(payment_handler::create_payment),
        )
        .route(
            "/payments/{payment_id}",
            get(payment_handler::get_payment)
                .put(payment_handler::update_payment)
                .delete(payment_handler::delete_payment),
        )

        // ===== Settlement =====
        .route("/payments/{payment_id}/process", post(payment_handler::process_payment))
        .route("/payments/{payment_id}/checkout", post(payment_handler::checkout_payment))

        // ===== Transaction Ledger =====
        .route("/transactions", get(transaction_handler::list_transactions))
        .route("/transactions/{payment_id}", get(transaction_handler::get_transaction))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_documents_raw_webhook_body() {
        let doc = ApiDoc::openapi();

        let webhook = doc.paths.paths.get("/api/webhooks/paystack").expect("webhook path documented");
        let body = webhook
            .post
            .as_ref()
            .and_then(|operation| operation.request_body.as_ref())
            .expect("webhook request body documented");

        assert!(body.content.contains_key("application/json"));
    }
}
