use crate::domain::gateway::{GatewayCallback, GatewayOutcome};
use crate::error::AppResult;
use crate::handlers::paystack_service::PaymentGateway;
use crate::services::payment_service::PaymentService;
use bigdecimal::BigDecimal;
use std::sync::Arc;
use uuid::Uuid;

/// Hasil rekonsiliasi satu callback. Semua varian dibalas 200 ke gateway kecuali `Rejected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Completed(Uuid),
    Failed(Uuid),
    // Payment sudah terminal, callback diabaikan
    Duplicate(Uuid),
    UnknownPayment(Uuid),
    // Reference atau amount bukan milik checkout yang sedang aktif
    Mismatched(Uuid),
    Malformed,
    // Signature tidak valid
    Rejected,
}

impl ReconcileOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ReconcileOutcome::Completed(_) => "Payment completed",
            ReconcileOutcome::Failed(_) => "Payment marked as failed",
            ReconcileOutcome::Duplicate(_) => "Payment already settled",
            ReconcileOutcome::UnknownPayment(_) => "Payment not found, callback ignored",
            ReconcileOutcome::Mismatched(_) => "Callback does not match the current checkout, ignored",
            ReconcileOutcome::Malformed => "Callback payload ignored",
            ReconcileOutcome::Rejected => "Invalid signature",
        }
    }
}

/// Callback Reconciler: menerapkan laporan gateway ke payment lewat orchestrator.
pub struct CallbackReconciler {
    payments: Arc<PaymentService>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CallbackReconciler {
    pub fn new(payments: Arc<PaymentService>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { payments, gateway }
    }

    /// Entry point webhook: verifikasi signature, lalu rekonsiliasi.
    pub async fn handle_webhook(&self, raw_payload: &[u8], signature: Option<&str>) -> AppResult<ReconcileOutcome> {
        let signed = signature.is_some_and(|sig| self.gateway.verify_signature(raw_payload, sig));
        if !signed {
            tracing::warn!("Webhook rejected: missing or invalid signature");
            return Ok(ReconcileOutcome::Rejected);
        }

        let Ok(raw) = std::str::from_utf8(raw_payload) else {
            tracing::warn!("Webhook payload is not valid UTF-8, discarding");
            return Ok(ReconcileOutcome::Malformed);
        };

        self.reconcile(raw).await
    }

    /// Parse callback mentah dan terapkan hasilnya. Payload rusak dibuang tanpa error.
    pub async fn reconcile(&self, raw_payload: &str) -> AppResult<ReconcileOutcome> {
        let callback = match self.gateway.parse_callback(raw_payload) {
            Ok(callback) => callback,
            Err(e) => {
                tracing::warn!("Discarding gateway callback: {}", e);
                return Ok(ReconcileOutcome::Malformed);
            }
        };

        tracing::info!(
            "📥 Gateway callback: payment_id={}, outcome={:?}, reference={:?}",
            callback.payment_id, callback.outcome, callback.reference
        );

        self.apply(&callback).await
    }

    /// Terapkan laporan gateway ke satu payment. Dipakai juga oleh pending sweep.
    ///
    /// Laporan hanya berlaku untuk checkout terakhir: reference harus sama dengan
    /// `gateway_reference` payment, dan amount sukses harus sama dengan amount checkout.
    pub async fn apply(&self, callback: &GatewayCallback) -> AppResult<ReconcileOutcome> {
        let payment_id = callback.payment_id;

        let Some(payment) = self.payments.find_payment(payment_id).await? else {
            tracing::warn!("Callback for unknown payment {}, discarding", payment_id);
            return Ok(ReconcileOutcome::UnknownPayment(payment_id));
        };

        if payment.is_terminal() {
            tracing::info!(
                "Duplicate callback for payment {} (already {}), ignoring",
                payment_id, payment.status
            );
            return Ok(ReconcileOutcome::Duplicate(payment_id));
        }

        if !payment.matches_checkout(callback.reference.as_deref()) {
            tracing::warn!(
                "Callback reference does not match checkout: payment_id={}, expected={:?}, reported={:?}",
                payment_id, payment.gateway_reference, callback.reference
            );
            return Ok(ReconcileOutcome::Mismatched(payment_id));
        }

        let applied = match &callback.outcome {
            GatewayOutcome::Success => {
                let reported = callback.amount_minor.map(|minor| BigDecimal::new(minor.into(), 2));

                let amount = match (payment.amount.clone(), reported) {
                    (Some(expected), Some(reported)) if expected != reported => {
                        tracing::warn!(
                            "Callback amount does not match checkout: payment_id={}, expected={}, reported={}",
                            payment_id, expected, reported
                        );
                        return Ok(ReconcileOutcome::Mismatched(payment_id));
                    }
                    (Some(expected), _) => expected,
                    (None, Some(reported)) => reported,
                    (None, None) => {
                        tracing::warn!("Success callback without any amount: payment_id={}, discarding", payment_id);
                        return Ok(ReconcileOutcome::Malformed);
                    }
                };

                self.payments
                    .complete_from_gateway(&payment, amount)
                    .await?
                    .map(|p| ReconcileOutcome::Completed(p.id))
            }
            GatewayOutcome::Failed(reason) => self.payments
                .fail_from_gateway(&payment, reason)
                .await?
                .map(|p| ReconcileOutcome::Failed(p.id)),
        };

        // Kalah race dengan callback/direct process lain
        Ok(applied.unwrap_or(ReconcileOutcome::Duplicate(payment_id)))
    }
}
