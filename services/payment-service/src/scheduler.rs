use crate::domain::gateway::GatewayCallback;
use crate::error::AppResult;
use crate::handlers::paystack_service::PaymentGateway;
use crate::services::{CallbackReconciler, PaymentService, ReconcileOutcome};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

// Jumlah payment yang dicek per putaran
const SWEEP_BATCH_SIZE: i64 = 50;

/// Ringkasan satu putaran sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
    pub still_pending: usize,
}

/// Background scheduler yang menanyakan status checkout gateway yang tidak pernah di-callback.
///
/// Payment tidak pernah di-expire oleh sweep; jawaban non-final atau gateway yang tidak
/// bisa dihubungi membiarkan payment tetap pending.
pub struct PendingSweep {
    payments: Arc<PaymentService>,
    reconciler: Arc<CallbackReconciler>,
    gateway: Arc<dyn PaymentGateway>,
    interval: Duration,
    min_age: chrono::Duration,
}

impl PendingSweep {
    pub fn new(
        payments: Arc<PaymentService>,
        reconciler: Arc<CallbackReconciler>,
        gateway: Arc<dyn PaymentGateway>,
        interval: Duration,
        min_age: chrono::Duration,
    ) -> Self {
        Self { payments, reconciler, gateway, interval, min_age }
    }

    /// Start background sweep
    pub fn start(self) {
        if std::env::var("DISABLE_SCHEDULER").unwrap_or_else(|_| "false".to_string()) == "true" {
            tracing::info!("💳 Pending sweep disabled via DISABLE_SCHEDULER environment variable");
            return;
        }

        tracing::info!(
            "💳 Starting pending payment sweep (every {}s, min age {} min)",
            self.interval.as_secs(),
            self.min_age.num_minutes()
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);

            loop {
                interval.tick().await;

                for attempt in 1..=3 {
                    match self.run_once().await {
                        Ok(report) => {
                            if report.checked > 0 {
                                tracing::info!(
                                    "✅ Pending sweep: checked={}, completed={}, failed={}, still_pending={}",
                                    report.checked, report.completed, report.failed, report.still_pending
                                );
                            }
                            break;
                        }
                        Err(e) => {
                            if attempt == 3 {
                                tracing::error!("❌ Pending sweep failed after 3 attempts: {}", e);
                            } else {
                                tokio::time::sleep(Duration::from_millis(1000)).await;
                            }
                        }
                    }
                }
            }
        });
    }

    /// Satu putaran: verify setiap payment pending yang sudah cukup tua.
    pub async fn run_once(&self) -> AppResult<SweepReport> {
        let older_than = Utc::now() - self.min_age;
        let stale = self.payments.stale_gateway_payments(older_than, SWEEP_BATCH_SIZE).await?;

        let mut report = SweepReport::default();

        for payment in stale {
            report.checked += 1;

            let Some(reference) = payment.gateway_reference.as_deref() else {
                report.still_pending += 1;
                continue;
            };

            let outcome = match self.gateway.verify(reference).await {
                Ok(Some(outcome)) => outcome,
                Ok(None) => {
                    tracing::debug!("Gateway still pending: payment_id={}, reference={}", payment.id, reference);
                    report.still_pending += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Gateway verify failed: payment_id={}, error={}", payment.id, e);
                    report.still_pending += 1;
                    continue;
                }
            };

            let callback = GatewayCallback {
                payment_id: payment.id,
                outcome,
                reference: Some(reference.to_string()),
                amount_minor: None,
            };

            // Error satu payment tidak menghentikan sisa batch
            match self.reconciler.apply(&callback).await {
                Ok(ReconcileOutcome::Completed(_)) => report.completed += 1,
                Ok(ReconcileOutcome::Failed(_)) => report.failed += 1,
                Ok(ReconcileOutcome::Mismatched(_)) => report.still_pending += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Sweep could not apply gateway status: payment_id={}, error={}", payment.id, e);
                    report.still_pending += 1;
                }
            }
        }

        Ok(report)
    }
}
