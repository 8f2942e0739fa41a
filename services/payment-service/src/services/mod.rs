// Service layer: orchestrator dan callback reconciler
pub mod callback_reconciler;
pub mod payment_service;

pub use callback_reconciler::{CallbackReconciler, ReconcileOutcome};
pub use payment_service::PaymentService;
