use crate::config::AppState;
use crate::domain::payment::WebhookResponse;
use crate::error::AppError;
use crate::services::ReconcileOutcome;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};

// Header signature dari Paystack
const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Handle Paystack webhook notifications
///
/// Selain signature invalid, gateway selalu menerima 200: payload rusak, payment tidak
/// dikenal, dan callback duplikat dibuang di sini supaya gateway tidak retry tanpa akhir.
#[utoipa::path(
    post,
    path = "/api/webhooks/paystack",
    tag = "Payment Service",
    summary = "Handle Paystack webhook",
    description = "Apply a gateway charge result to its payment. Requires a valid x-paystack-signature header.",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Webhook accepted", body = WebhookResponse),
        (status = 401, description = "Invalid signature", body = WebhookResponse),
        (status = 500, description = "Database unavailable, gateway should retry")
    )
)]
pub async fn paystack_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = app_state.reconciler.handle_webhook(&body, signature).await?;

    let status = match outcome {
        ReconcileOutcome::Rejected => StatusCode::UNAUTHORIZED,
        _ => StatusCode::OK,
    };

    Ok((
        status,
        Json(WebhookResponse {
            success: outcome != ReconcileOutcome::Rejected,
            message: outcome.message().to_string(),
        }),
    ))
}
