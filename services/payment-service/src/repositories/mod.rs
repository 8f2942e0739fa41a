// Repository modules untuk Payment Service
pub mod lease_repo;
pub mod notification_repo;
pub mod payment_repo;
pub mod transaction_repo;

#[cfg(test)]
pub mod memory;

// Export publik
pub use lease_repo::{LeaseDirectory, LeaseRepository};
pub use notification_repo::{NotificationRepository, NotificationSink};
pub use payment_repo::{PaymentRepository, PaymentStore};
pub use transaction_repo::{TransactionLedger, TransactionRepository};
