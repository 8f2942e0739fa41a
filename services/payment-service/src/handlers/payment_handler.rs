use crate::config::{AppConfig, AppState};
use crate::domain::payment::{
    CheckoutResponse, CreatePaymentRequest, Payment, PaymentDetails, UpdatePaymentRequest,
};
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

/// Create new payment
#[utoipa::path(
    post,
    path = "/api/payments",
    tag = "Payment Service",
    summary = "Create payment",
    description = "Create a pending rent, deposit or fee payment. Tenants create their own; landlords create on behalf of a tenant.",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment created", body = serde_json::Value),
        (status = 400, description = "Missing tenant, landlord or lease"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_payment(
    auth: AuthUser,
    State(app_state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let payment = app_state.payments.create_payment(&auth, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Payment created successfully",
            "data": payment
        })),
    ))
}

/// List payments for the caller
#[utoipa::path(
    get,
    path = "/api/payments",
    tag = "Payment Service",
    summary = "List payments",
    description = "Tenants see payments they owe, landlords see payments owed to them",
    responses(
        (status = 200, description = "Payments retrieved", body = serde_json::Value),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_payments(
    auth: AuthUser,
    State(app_state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let payments = app_state.payments.list_payments(&auth).await?;

    Ok(Json(json!({
        "success": true,
        "data": payments,
        "total": payments.len()
    })))
}

/// Get payment by id
#[utoipa::path(
    get,
    path = "/api/payments/{payment_id}",
    tag = "Payment Service",
    summary = "Get payment",
    params(
        ("payment_id" = Uuid, Path, description = "Payment id")
    ),
    responses(
        (status = 200, description = "Payment retrieved", body = Payment),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a party to this payment"),
        (status = 404, description = "Payment not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_payment(
    auth: AuthUser,
    State(app_state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let payment = app_state.payments.get_payment(payment_id, &auth).await?;

    Ok(Json(json!({
        "success": true,
        "data": payment
    })))
}

/// Update pending payment (landlord)
#[utoipa::path(
    put,
    path = "/api/payments/{payment_id}",
    tag = "Payment Service",
    summary = "Update payment",
    description = "Landlord edits amount, lease, type or labels while the payment is still pending",
    params(
        ("payment_id" = Uuid, Path, description = "Payment id")
    ),
    request_body = UpdatePaymentRequest,
    responses(
        (status = 200, description = "Payment updated", body = Payment),
        (status = 400, description = "Invalid amount or label"),
        (status = 403, description = "Not the landlord of this payment"),
        (status = 404, description = "Payment or lease not found"),
        (status = 409, description = "Payment already completed or failed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_payment(
    auth: AuthUser,
    State(app_state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<UpdatePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    auth.require_landlord()?;

    let payment = app_state.payments.update_payment(payment_id, auth.user_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment updated successfully",
        "data": payment
    })))
}

/// Delete pending payment (landlord)
#[utoipa::path(
    delete,
    path = "/api/payments/{payment_id}",
    tag = "Payment Service",
    summary = "Delete payment",
    description = "Landlord removes a pending payment; the tenant is notified",
    params(
        ("payment_id" = Uuid, Path, description = "Payment id")
    ),
    responses(
        (status = 200, description = "Payment deleted", body = serde_json::Value),
        (status = 403, description = "Not the landlord of this payment"),
        (status = 404, description = "Payment not found"),
        (status = 409, description = "Settled payments cannot be deleted")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_payment(
    auth: AuthUser,
    State(app_state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    auth.require_landlord()?;

    let removed = app_state.payments.delete_payment(payment_id, auth.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment deleted successfully",
        "data": {
            "payment_id": removed.id,
            "reference": removed.reference
        }
    })))
}

/// Settle payment directly (tenant)
#[utoipa::path(
    post,
    path = "/api/payments/{payment_id}/process",
    tag = "Payment Service",
    summary = "Process payment",
    description = "Settle a pending payment immediately, record it in the ledger and notify both parties",
    params(
        ("payment_id" = Uuid, Path, description = "Payment id")
    ),
    request_body = PaymentDetails,
    responses(
        (status = 200, description = "Payment completed", body = Payment),
        (status = 400, description = "Invalid amount"),
        (status = 403, description = "Payment belongs to another tenant"),
        (status = 404, description = "Payment or lease not found"),
        (status = 409, description = "Payment already completed or failed")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn process_payment(
    auth: AuthUser,
    State(app_state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(details): Json<PaymentDetails>,
) -> Result<Json<Value>, AppError> {
    auth.require_tenant()?;

    let payment = app_state.payments.process_direct(payment_id, auth.user_id, details).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Payment completed successfully",
        "data": payment
    })))
}

/// Start gateway checkout (tenant)
#[utoipa::path(
    post,
    path = "/api/payments/{payment_id}/checkout",
    tag = "Payment Service",
    summary = "Start gateway checkout",
    description = "Create a Paystack checkout session. The payment stays pending until the gateway callback arrives.",
    params(
        ("payment_id" = Uuid, Path, description = "Payment id")
    ),
    request_body = PaymentDetails,
    responses(
        (status = 200, description = "Checkout created", body = CheckoutResponse),
        (status = 400, description = "Invalid amount or email"),
        (status = 403, description = "Payment belongs to another tenant"),
        (status = 404, description = "Payment or lease not found"),
        (status = 409, description = "Payment already completed or failed"),
        (status = 503, description = "Payment gateway unavailable")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn checkout_payment(
    auth: AuthUser,
    State(app_state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(mut details): Json<PaymentDetails>,
) -> Result<Json<Value>, AppError> {
    auth.require_tenant()?;

    // Email dari token dipakai kalau body tidak mengirim email
    if details.email.is_none() {
        details.email = Some(auth.email.clone());
    }

    let checkout = app_state.payments
        .initiate_gateway_settlement(payment_id, auth.user_id, details)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Checkout created, redirect the tenant to authorization_url",
        "data": checkout
    })))
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Payment Service",
    summary = "Health check",
    responses(
        (status = 200, description = "Service healthy", body = serde_json::Value),
        (status = 503, description = "Database unreachable", body = serde_json::Value)
    )
)]
pub async fn health_check(State(app_state): State<AppState>) -> (StatusCode, Json<Value>) {
    let health = app_state.health_check().await;
    let status = if health.overall == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": health.overall,
            "database": health.database,
            "service": "payment-service",
            "timestamp": Utc::now(),
            "version": app_state.config.app_version,
        })),
    )
}

/// Get service information
#[utoipa::path(
    get,
    path = "/info",
    tag = "Payment Service",
    summary = "Get service information",
    responses(
        (status = 200, description = "Service information retrieved successfully", body = serde_json::Value)
    )
)]
pub async fn get_service_info(State(config): State<AppConfig>) -> Json<Value> {
    Json(json!({
        "service": "payment-service",
        "version": config.app_version,
        "environment": config.environment,
        "gateway": {
            "provider": "paystack",
            "mode": config.gateway_mode()
        },
        "supported_payment_types": ["rent", "deposit", "fee"],
        "features": [
            "Direct settlement",
            "Paystack checkout with signed webhooks",
            "Idempotent transaction ledger",
            "Pending checkout reconciliation",
            "Tenant and landlord notifications"
        ],
        "timestamp": Utc::now()
    }))
}
