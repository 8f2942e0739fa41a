mod config;
mod domain;
mod error;
mod handlers;
mod middleware;
mod repositories;
mod routes;
mod scheduler;
mod services;

use config::AppState;
use routes::create_routes;
use scheduler::PendingSweep;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Entry point dari Payment Service
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Setup logging dengan environment
    setup_logging();

    // Create application state (database, migrasi, gateway, rate limiter)
    let app_state = AppState::from_env().await?;

    info!("🚀 Payment Service starting on {}:{}", app_state.config.server_host, app_state.config.server_port);
    info!(
        "💳 Gateway: Paystack ({}) | API: {}",
        app_state.config.gateway_mode(),
        app_state.config.paystack_api_url
    );

    // Sweep untuk checkout yang callback-nya tidak pernah datang
    PendingSweep::new(
        app_state.payments.clone(),
        app_state.reconciler.clone(),
        app_state.gateway.clone(),
        app_state.config.sweep_interval,
        app_state.config.sweep_min_age,
    )
    .start();

    start_server(app_state).await
}

/// Inisialisasi structured logging berdasarkan environment
fn setup_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("payment_service=debug,tower_http=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Start server dengan graceful shutdown
async fn start_server(app_state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let address = format!("{}:{}", app_state.config.server_host, app_state.config.server_port);
    let app = create_routes(app_state)?;

    let listener = TcpListener::bind(&address).await?;

    info!("🌐 Server running on http://{}", address);
    info!("📚 API Docs: http://{}/docs", address);
    info!("🏥 Health Check: http://{}/health", address);

    // Setup graceful shutdown signal handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("🛑 Received shutdown signal");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("✅ Payment Service shutdown successfully");
    Ok(())
}
