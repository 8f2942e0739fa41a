use crate::config::AppState;
use crate::domain::transaction::Transaction;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

/// List ledger entries for the caller
#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "Transaction Ledger",
    summary = "List transactions",
    description = "Settled payments where the caller is the tenant or the landlord",
    responses(
        (status = 200, description = "Transactions retrieved", body = serde_json::Value),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_transactions(
    auth: AuthUser,
    State(app_state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let transactions = app_state.payments.list_transactions(&auth).await?;

    Ok(Json(json!({
        "success": true,
        "data": transactions,
        "total": transactions.len()
    })))
}

/// Get ledger entry by payment id
#[utoipa::path(
    get,
    path = "/api/transactions/{payment_id}",
    tag = "Transaction Ledger",
    summary = "Get transaction",
    params(
        ("payment_id" = Uuid, Path, description = "Id of the settled payment")
    ),
    responses(
        (status = 200, description = "Transaction retrieved", body = Transaction),
        (status = 403, description = "Not a party to this transaction"),
        (status = 404, description = "Transaction not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_transaction(
    auth: AuthUser,
    State(app_state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let transaction = app_state.payments.get_transaction(payment_id, &auth).await?;

    Ok(Json(json!({
        "success": true,
        "data": transaction
    })))
}
