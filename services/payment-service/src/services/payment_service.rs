use crate::domain::notification::NotificationMessage;
use crate::domain::payment::{
    CheckoutResponse, CreatePaymentRequest, NewPayment, Payment, PaymentChanges, PaymentDetails,
    PaymentStatus, Settlement, UpdatePaymentRequest,
};
use crate::domain::transaction::Transaction;
use crate::error::{AppError, AppResult};
use crate::handlers::paystack_service::PaymentGateway;
use crate::middleware::auth::AuthUser;
use crate::repositories::{LeaseDirectory, NotificationSink, PaymentStore, TransactionLedger};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use shared::models::Role;
use shared::utils::validation::{clean_label, is_valid_amount, is_valid_email, MAX_LABEL_LEN};
use std::sync::Arc;
use uuid::Uuid;

// Batas percobaan generate reference unik
const REFERENCE_ATTEMPTS: usize = 5;

/// Payment Orchestrator.
///
/// Pemilik tunggal transisi status payment. Direct process dan callback gateway sama-sama
/// lewat `settle_if_pending` di store (status + ledger dalam satu transaksi), lalu
/// `announce_settlement` untuk notifikasi.
pub struct PaymentService {
    payments: Arc<dyn PaymentStore>,
    ledger: Arc<dyn TransactionLedger>,
    leases: Arc<dyn LeaseDirectory>,
    notifier: Arc<dyn NotificationSink>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        ledger: Arc<dyn TransactionLedger>,
        leases: Arc<dyn LeaseDirectory>,
        notifier: Arc<dyn NotificationSink>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self { payments, ledger, leases, notifier, gateway }
    }

    /// Buat payment `pending`. Tenant tercatat sebagai tenant-nya sendiri, landlord
    /// tercatat sebagai landlord-nya sendiri; pihak lain harus ada di request.
    pub async fn create_payment(&self, caller: &AuthUser, request: CreatePaymentRequest) -> AppResult<Payment> {
        let (tenant_id, landlord_id) = match caller.role {
            Role::Tenant => {
                if request.tenant_id.is_some_and(|id| id != caller.user_id) {
                    return Err(AppError::forbidden("Tenants can only create their own payments"));
                }
                (Some(caller.user_id), request.landlord_id)
            }
            Role::Landlord => {
                if request.landlord_id.is_some_and(|id| id != caller.user_id) {
                    return Err(AppError::forbidden("Landlords can only record payments for themselves"));
                }
                (request.tenant_id, Some(caller.user_id))
            }
        };

        let lease_id = request.lease_id
            .ok_or_else(|| AppError::validation("lease_id is required"))?;
        let tenant_id = tenant_id
            .ok_or_else(|| AppError::validation("tenant_id is required"))?;

        // Landlord id boleh di-back-fill dari lease
        let landlord_id = match landlord_id {
            Some(id) => id,
            None => self.leases.landlord_id(lease_id).await?
                .ok_or_else(|| AppError::validation("landlord_id is required"))?,
        };

        if let Some(amount) = &request.amount {
            validate_amount(amount)?;
        }

        let new_payment = NewPayment {
            id: Uuid::new_v4(),
            reference: self.unique_reference().await?,
            tenant_id,
            landlord_id,
            lease_id,
            amount: request.amount,
            payment_type: request.payment_type,
            name: optional_label("name", request.name.as_deref())?,
            apartment: optional_label("apartment", request.apartment.as_deref())?,
            created_at: Utc::now(),
        };

        let payment = self.payments.insert(&new_payment).await?;

        tracing::info!(
            "Payment created: id={}, reference={}, tenant_id={}, landlord_id={}, lease_id={}, by={}",
            payment.id, payment.reference, payment.tenant_id, payment.landlord_id, payment.lease_id, caller.role
        );

        Ok(payment)
    }

    /// Direct settlement oleh tenant. Sukses berarti `completed` + ledger + notifikasi.
    pub async fn process_direct(
        &self,
        payment_id: Uuid,
        caller_tenant_id: i32,
        details: PaymentDetails,
    ) -> AppResult<Payment> {
        validate_amount(&details.amount)?;

        let payment = self.owned_pending_payment(payment_id, caller_tenant_id).await?;
        let landlord_id = self.lease_landlord(payment.lease_id).await?;

        let settlement = Settlement {
            amount: details.amount,
            landlord_id,
            payment_date: Utc::now(),
        };

        let completed = self.payments.settle_if_pending(payment.id, &settlement).await?
            .ok_or_else(|| AppError::conflict("Payment was settled by another request"))?;

        tracing::info!(
            "💰 Payment settled directly: id={}, reference={}, amount={}",
            completed.id, completed.reference, settlement.amount
        );

        self.announce_settlement(&completed).await;

        Ok(completed)
    }

    /// Checkout lewat gateway. Status tetap `pending`, callback yang menentukan hasil akhir.
    pub async fn initiate_gateway_settlement(
        &self,
        payment_id: Uuid,
        caller_tenant_id: i32,
        details: PaymentDetails,
    ) -> AppResult<CheckoutResponse> {
        validate_amount(&details.amount)?;

        let email = details.email
            .as_deref()
            .map(str::trim)
            .filter(|email| is_valid_email(email))
            .ok_or_else(|| AppError::validation("A valid payer email is required for checkout"))?;

        let payment = self.owned_pending_payment(payment_id, caller_tenant_id).await?;
        let landlord_id = self.lease_landlord(payment.lease_id).await?;

        let initialization = self.gateway
            .initialize(payment.id, &details.amount, email)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Gateway initialization failed: payment_id={}, transport={}, error={}",
                    payment.id, e.is_transport(), e
                );
                e
            })?;

        let updated = self.payments
            .attach_gateway_if_pending(payment.id, &details.amount, landlord_id, &initialization.reference)
            .await?
            .ok_or_else(|| AppError::conflict("Payment was settled while checkout was being created"))?;

        tracing::info!(
            "🔗 Gateway checkout created: id={}, gateway_reference={}",
            updated.id, initialization.reference
        );

        Ok(CheckoutResponse {
            payment_id: updated.id,
            authorization_url: initialization.authorization_url,
            gateway_reference: initialization.reference,
            status: updated.status,
        })
    }

    /// Terapkan callback sukses dengan amount yang sudah dicocokkan reconciler.
    /// `None` kalau payment sudah terminal (duplikat).
    pub async fn complete_from_gateway(&self, payment: &Payment, amount: BigDecimal) -> AppResult<Option<Payment>> {
        let settlement = Settlement {
            amount,
            landlord_id: payment.landlord_id,
            payment_date: Utc::now(),
        };

        let Some(completed) = self.payments.settle_if_pending(payment.id, &settlement).await? else {
            return Ok(None);
        };

        tracing::info!(
            "💰 Payment settled via gateway: id={}, reference={}, gateway_reference={:?}",
            completed.id, completed.reference, completed.gateway_reference
        );

        self.announce_settlement(&completed).await;

        Ok(Some(completed))
    }

    /// Terapkan callback gagal. Tidak ada ledger; hanya notifikasi ke tenant.
    pub async fn fail_from_gateway(&self, payment: &Payment, reason: &str) -> AppResult<Option<Payment>> {
        let Some(failed) = self.payments.fail_if_pending(payment.id).await? else {
            return Ok(None);
        };

        tracing::info!(
            "❌ Payment failed via gateway: id={}, reference={}, reason={}",
            failed.id, failed.reference, reason
        );

        self.notify(failed.tenant_id, &NotificationMessage::payment_failed(&failed)).await;

        Ok(Some(failed))
    }

    /// Notifikasi kedua pihak setelah settlement.
    ///
    /// Hanya dipanggil oleh pemenang `settle_if_pending`, jadi paling banyak sekali per payment.
    async fn announce_settlement(&self, payment: &Payment) {
        self.notify(payment.tenant_id, &NotificationMessage::payment_completed(payment)).await;
        self.notify(payment.landlord_id, &NotificationMessage::payment_received(payment)).await;
    }

    /// Landlord update detail payment selama masih pending
    pub async fn update_payment(
        &self,
        payment_id: Uuid,
        caller_landlord_id: i32,
        request: UpdatePaymentRequest,
    ) -> AppResult<Payment> {
        let payment = self.landlord_payment(payment_id, caller_landlord_id).await?;
        if payment.is_terminal() {
            return Err(AppError::conflict(format!("Payment is already {}", payment.status)));
        }

        if let Some(amount) = &request.amount {
            validate_amount(amount)?;
        }

        if let Some(lease_id) = request.lease_id {
            let owner = self.lease_landlord(lease_id).await?;
            if owner != caller_landlord_id {
                return Err(AppError::forbidden("Lease belongs to another landlord"));
            }
        }

        let changes = PaymentChanges {
            amount: request.amount,
            lease_id: request.lease_id,
            landlord_id: None,
            payment_type: request.payment_type,
            name: optional_label("name", request.name.as_deref())?,
            apartment: optional_label("apartment", request.apartment.as_deref())?,
        };

        let updated = self.payments.update_details_if_pending(payment.id, &changes).await?
            .ok_or_else(|| AppError::conflict("Payment was settled while being updated"))?;

        tracing::info!("Payment updated: id={}, by landlord_id={}", updated.id, caller_landlord_id);

        Ok(updated)
    }

    /// Landlord hapus payment. Payment terminal (punya histori) tidak boleh dihapus.
    pub async fn delete_payment(&self, payment_id: Uuid, caller_landlord_id: i32) -> AppResult<Payment> {
        let payment = self.landlord_payment(payment_id, caller_landlord_id).await?;
        if payment.is_terminal() {
            return Err(AppError::conflict(format!(
                "Payment is already {} and cannot be deleted",
                payment.status
            )));
        }

        let removed = self.payments.delete_if_pending(payment.id).await?
            .ok_or_else(|| AppError::conflict("Payment was settled while being deleted"))?;

        tracing::info!(
            "🗑️ Payment deleted: id={}, reference={}, by landlord_id={}",
            removed.id, removed.reference, caller_landlord_id
        );

        self.notify(removed.tenant_id, &NotificationMessage::payment_removed(&removed)).await;

        Ok(removed)
    }

    /// Payment hanya bisa dibaca oleh tenant atau landlord-nya
    pub async fn get_payment(&self, payment_id: Uuid, caller: &AuthUser) -> AppResult<Payment> {
        let payment = self.find_payment(payment_id).await?
            .ok_or_else(|| AppError::not_found("Payment not found"))?;

        if !payment.involves(caller.user_id) {
            return Err(AppError::forbidden("Access denied: not a party to this payment"));
        }

        Ok(payment)
    }

    pub async fn list_payments(&self, caller: &AuthUser) -> AppResult<Vec<Payment>> {
        match caller.role {
            Role::Tenant => self.payments.list_for_tenant(caller.user_id).await,
            Role::Landlord => self.payments.list_for_landlord(caller.user_id).await,
        }
    }

    pub async fn get_transaction(&self, payment_id: Uuid, caller: &AuthUser) -> AppResult<Transaction> {
        let transaction = self.ledger.find_by_id(payment_id).await?
            .ok_or_else(|| AppError::not_found("Transaction not found"))?;

        if transaction.tenant_id != caller.user_id && transaction.landlord_id != caller.user_id {
            return Err(AppError::forbidden("Access denied: not a party to this transaction"));
        }

        Ok(transaction)
    }

    pub async fn list_transactions(&self, caller: &AuthUser) -> AppResult<Vec<Transaction>> {
        match caller.role {
            Role::Tenant => self.ledger.list_for_tenant(caller.user_id).await,
            Role::Landlord => self.ledger.list_for_landlord(caller.user_id).await,
        }
    }

    // Lookup tanpa cek ownership, untuk callback dan sweep
    pub async fn find_payment(&self, payment_id: Uuid) -> AppResult<Option<Payment>> {
        self.payments.find_by_id(payment_id).await
    }

    pub async fn stale_gateway_payments(&self, older_than: DateTime<Utc>, limit: i64) -> AppResult<Vec<Payment>> {
        self.payments.list_stale_pending(older_than, limit).await
    }

    // Helper Functions

    async fn owned_pending_payment(&self, payment_id: Uuid, caller_tenant_id: i32) -> AppResult<Payment> {
        let payment = self.find_payment(payment_id).await?
            .ok_or_else(|| AppError::not_found("Payment not found"))?;

        if payment.tenant_id != caller_tenant_id {
            tracing::warn!(
                "Settlement attempt by non-owner: payment_id={}, caller_tenant_id={}",
                payment_id, caller_tenant_id
            );
            return Err(AppError::forbidden("Access denied: payment belongs to another tenant"));
        }

        if payment.status != PaymentStatus::Pending {
            return Err(AppError::conflict(format!("Payment is already {}", payment.status)));
        }

        Ok(payment)
    }

    async fn landlord_payment(&self, payment_id: Uuid, caller_landlord_id: i32) -> AppResult<Payment> {
        let payment = self.find_payment(payment_id).await?
            .ok_or_else(|| AppError::not_found("Payment not found"))?;

        if payment.landlord_id != caller_landlord_id {
            return Err(AppError::forbidden("Access denied: payment belongs to another landlord"));
        }

        Ok(payment)
    }

    async fn lease_landlord(&self, lease_id: i32) -> AppResult<i32> {
        self.leases.landlord_id(lease_id).await?
            .ok_or_else(|| AppError::not_found("Lease not found"))
    }

    async fn unique_reference(&self) -> AppResult<String> {
        for _ in 0..REFERENCE_ATTEMPTS {
            let reference = Payment::generate_reference();
            if !self.payments.reference_exists(&reference).await? {
                return Ok(reference);
            }
            tracing::debug!("Payment reference collision, retrying: {}", reference);
        }
        Err(AppError::internal("Could not generate a unique payment reference"))
    }

    // Fire-and-forget: kegagalan hanya di-log
    async fn notify(&self, recipient_id: i32, message: &NotificationMessage) {
        if let Err(e) = self.notifier.send(recipient_id, message).await {
            tracing::warn!(
                "Notification delivery failed: user_id={}, type={}, error={}",
                recipient_id,
                message.notification_type.as_str(),
                e
            );
        }
    }
}

fn validate_amount(amount: &BigDecimal) -> AppResult<()> {
    if !is_valid_amount(amount) {
        return Err(AppError::validation(
            "Amount must be greater than 0 with at most two decimal places",
        ));
    }
    Ok(())
}

fn optional_label(field: &str, value: Option<&str>) -> AppResult<Option<String>> {
    value
        .map(|raw| clean_label(raw).ok_or_else(|| {
            AppError::validation(format!("{} must be 1-{} characters", field, MAX_LABEL_LEN))
        }))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway::GatewayInitialization;
    use crate::domain::notification::NotificationType;
    use crate::handlers::paystack_service::{GatewayError, MockPaymentGateway};
    use crate::repositories::memory::{InMemoryLedger, InMemoryLeases, InMemoryPaymentStore, RecordingSink};
    use crate::repositories::notification_repo::MockNotificationSink;
    use std::str::FromStr;

    const TENANT: i32 = 1;
    const OTHER_TENANT: i32 = 11;
    const LANDLORD: i32 = 2;
    const OTHER_LANDLORD: i32 = 22;
    const LEASE: i32 = 3;
    const OTHER_LEASE: i32 = 33;

    struct Harness {
        service: PaymentService,
        payments: InMemoryPaymentStore,
        ledger: InMemoryLedger,
        sink: RecordingSink,
    }

    fn harness_with_gateway(gateway: MockPaymentGateway) -> Harness {
        let payments = InMemoryPaymentStore::new();
        let ledger = payments.ledger();
        let sink = RecordingSink::new();
        let leases = InMemoryLeases::with(&[(LEASE, LANDLORD), (OTHER_LEASE, OTHER_LANDLORD)]);

        let service = PaymentService::new(
            Arc::new(payments.clone()),
            Arc::new(ledger.clone()),
            Arc::new(leases),
            Arc::new(sink.clone()),
            Arc::new(gateway),
        );

        Harness { service, payments, ledger, sink }
    }

    fn harness() -> Harness {
        harness_with_gateway(MockPaymentGateway::new())
    }

    fn user(user_id: i32, role: Role) -> AuthUser {
        AuthUser {
            user_id,
            email: format!("user{}@example.com", user_id),
            role,
        }
    }

    fn details(amount: i64) -> PaymentDetails {
        PaymentDetails {
            amount: BigDecimal::from(amount),
            email: Some("tenant@example.com".to_string()),
        }
    }

    async fn create_pending(h: &Harness) -> Payment {
        let request = CreatePaymentRequest {
            landlord_id: Some(LANDLORD),
            lease_id: Some(LEASE),
            name: Some("October rent".to_string()),
            ..Default::default()
        };
        h.service.create_payment(&user(TENANT, Role::Tenant), request).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_payment_starts_pending() {
        let h = harness();
        let payment = create_pending(&h).await;

        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.tenant_id, TENANT);
        assert_eq!(payment.landlord_id, LANDLORD);
        assert_eq!(payment.amount, None);
        assert_eq!(payment.payment_date, None);
        assert_eq!(payment.created_at, payment.updated_at);
        assert!(payment.reference.starts_with("RENT-"));
    }

    #[tokio::test]
    async fn test_create_payment_requires_lease_and_tenant() {
        let h = harness();

        let missing_lease = CreatePaymentRequest {
            landlord_id: Some(LANDLORD),
            ..Default::default()
        };
        let err = h.service.create_payment(&user(TENANT, Role::Tenant), missing_lease).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        // Landlord mencatat payment tanpa tenant
        let missing_tenant = CreatePaymentRequest {
            lease_id: Some(LEASE),
            ..Default::default()
        };
        let err = h.service.create_payment(&user(LANDLORD, Role::Landlord), missing_tenant).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_payment_backfills_landlord_from_lease() {
        let h = harness();
        let request = CreatePaymentRequest {
            lease_id: Some(LEASE),
            ..Default::default()
        };

        let payment = h.service.create_payment(&user(TENANT, Role::Tenant), request).await.unwrap();
        assert_eq!(payment.landlord_id, LANDLORD);

        let unknown_lease = CreatePaymentRequest {
            lease_id: Some(999),
            ..Default::default()
        };
        let err = h.service.create_payment(&user(TENANT, Role::Tenant), unknown_lease).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_payment_on_behalf_of_tenant() {
        let h = harness();
        let request = CreatePaymentRequest {
            tenant_id: Some(TENANT),
            lease_id: Some(LEASE),
            amount: Some(BigDecimal::from(750)),
            ..Default::default()
        };

        let payment = h.service.create_payment(&user(LANDLORD, Role::Landlord), request).await.unwrap();
        assert_eq!(payment.tenant_id, TENANT);
        assert_eq!(payment.landlord_id, LANDLORD);
        assert_eq!(payment.amount, Some(BigDecimal::from(750)));
    }

    #[tokio::test]
    async fn test_create_payment_for_someone_else_is_forbidden() {
        let h = harness();
        let request = CreatePaymentRequest {
            tenant_id: Some(OTHER_TENANT),
            landlord_id: Some(LANDLORD),
            lease_id: Some(LEASE),
            ..Default::default()
        };

        let err = h.service.create_payment(&user(TENANT, Role::Tenant), request).await.unwrap_err();
        assert!(matches!(err, AppError::ForbiddenError(_)));
    }

    #[tokio::test]
    async fn test_create_payment_rejects_bad_amount_and_labels() {
        let h = harness();

        let request = CreatePaymentRequest {
            landlord_id: Some(LANDLORD),
            lease_id: Some(LEASE),
            amount: Some(BigDecimal::from(-5)),
            ..Default::default()
        };
        let err = h.service.create_payment(&user(TENANT, Role::Tenant), request).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let request = CreatePaymentRequest {
            landlord_id: Some(LANDLORD),
            lease_id: Some(LEASE),
            apartment: Some("   ".to_string()),
            ..Default::default()
        };
        let err = h.service.create_payment(&user(TENANT, Role::Tenant), request).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_process_direct_settles_once() {
        let h = harness();
        let payment = create_pending(&h).await;

        let completed = h.service.process_direct(payment.id, TENANT, details(500)).await.unwrap();

        assert_eq!(completed.status, PaymentStatus::Completed);
        assert!(completed.payment_date.is_some());
        assert_eq!(completed.amount, Some(BigDecimal::from(500)));

        let tx = h.ledger.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(tx.amount, BigDecimal::from(500));
        assert_eq!(tx.landlord_id, LANDLORD);
        assert_eq!(h.ledger.len().await, 1);

        let sent = h.sink.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, TENANT);
        assert_eq!(sent[0].1.notification_type, NotificationType::PaymentCompleted);
        assert_eq!(sent[1].0, LANDLORD);
        assert_eq!(sent[1].1.notification_type, NotificationType::PaymentReceived);
    }

    #[tokio::test]
    async fn test_process_direct_by_other_tenant_is_forbidden() {
        let h = harness();
        let payment = create_pending(&h).await;

        let err = h.service.process_direct(payment.id, OTHER_TENANT, details(500)).await.unwrap_err();
        assert!(matches!(err, AppError::ForbiddenError(_)));

        let stored = h.payments.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert_eq!(h.ledger.len().await, 0);
        assert!(h.sink.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_process_direct_resolves_landlord_from_lease() {
        let h = harness();
        let mut payment = create_pending(&h).await;
        payment.landlord_id = 999;
        h.payments.put(payment.clone()).await;

        let completed = h.service.process_direct(payment.id, TENANT, details(500)).await.unwrap();
        assert_eq!(completed.landlord_id, LANDLORD);

        let recipients: Vec<i32> = h.sink.sent().await.into_iter().map(|(id, _)| id).collect();
        assert_eq!(recipients, vec![TENANT, LANDLORD]);
    }

    #[tokio::test]
    async fn test_process_direct_rejects_invalid_amount_without_state_change() {
        let h = harness();
        let payment = create_pending(&h).await;

        for amount in ["0", "-10", "12.345"] {
            let request = PaymentDetails {
                amount: BigDecimal::from_str(amount).unwrap(),
                email: None,
            };
            let err = h.service.process_direct(payment.id, TENANT, request).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)), "amount {}", amount);
        }

        let stored = h.payments.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert_eq!(stored.amount, None);
    }

    #[tokio::test]
    async fn test_process_direct_missing_payment_or_lease() {
        let h = harness();

        let err = h.service.process_direct(Uuid::new_v4(), TENANT, details(500)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFoundError(_)));

        let mut payment = create_pending(&h).await;
        payment.lease_id = 404;
        h.payments.put(payment.clone()).await;

        let err = h.service.process_direct(payment.id, TENANT, details(500)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFoundError(_)));

        let stored = h.payments.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_process_direct_twice_is_conflict() {
        let h = harness();
        let payment = create_pending(&h).await;

        h.service.process_direct(payment.id, TENANT, details(500)).await.unwrap();
        let err = h.service.process_direct(payment.id, TENANT, details(600)).await.unwrap_err();

        assert!(matches!(err, AppError::ConflictError(_)));
        assert_eq!(h.ledger.len().await, 1);
        assert_eq!(h.sink.sent().await.len(), 2);

        let tx = h.ledger.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(tx.amount, BigDecimal::from(500));
    }

    #[tokio::test]
    async fn test_ledger_failure_keeps_payment_pending_for_resubmit() {
        let h = harness();
        let payment = create_pending(&h).await;
        h.ledger.fail_next_write();

        assert!(h.service.process_direct(payment.id, TENANT, details(500)).await.is_err());

        let stored = h.payments.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert_eq!(stored.payment_date, None);
        assert_eq!(h.ledger.len().await, 0);
        assert!(h.sink.sent().await.is_empty());

        let completed = h.service.process_direct(payment.id, TENANT, details(500)).await.unwrap();
        assert_eq!(completed.status, PaymentStatus::Completed);
        assert_eq!(h.ledger.count_for(payment.id).await, 1);
        assert_eq!(h.sink.sent().await.len(), 2);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_roll_back_settlement() {
        let h = harness();
        let payment = create_pending(&h).await;
        h.sink.set_failing(true);

        let completed = h.service.process_direct(payment.id, TENANT, details(500)).await.unwrap();

        assert_eq!(completed.status, PaymentStatus::Completed);
        assert_eq!(h.ledger.count_for(payment.id).await, 1);
    }

    #[tokio::test]
    async fn test_initiate_gateway_keeps_payment_pending() {
        let mut gateway = MockPaymentGateway::new();
        let payments = InMemoryPaymentStore::new();

        // payment dibuat dulu supaya id-nya bisa dicek di expectation
        let seed = harness();
        let payment = create_pending(&seed).await;
        payments.put(payment.clone()).await;

        let expected_id = payment.id;
        gateway
            .expect_initialize()
            .withf(move |id, amount, email| {
                *id == expected_id && *amount == BigDecimal::from(500) && email == "tenant@example.com"
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(GatewayInitialization {
                    authorization_url: "https://checkout.paystack.com/xyz".to_string(),
                    reference: "PSK-xyz".to_string(),
                })
            });

        let ledger = payments.ledger();
        let service = PaymentService::new(
            Arc::new(payments.clone()),
            Arc::new(ledger.clone()),
            Arc::new(InMemoryLeases::with(&[(LEASE, LANDLORD)])),
            Arc::new(RecordingSink::new()),
            Arc::new(gateway),
        );

        let checkout = service.initiate_gateway_settlement(payment.id, TENANT, details(500)).await.unwrap();

        assert_eq!(checkout.authorization_url, "https://checkout.paystack.com/xyz");
        assert_eq!(checkout.status, PaymentStatus::Pending);

        let stored = payments.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert_eq!(stored.gateway_reference.as_deref(), Some("PSK-xyz"));
        assert_eq!(stored.amount, Some(BigDecimal::from(500)));
        assert_eq!(stored.payment_date, None);
        assert_eq!(ledger.len().await, 0);
    }

    #[tokio::test]
    async fn test_initiate_gateway_failure_leaves_payment_untouched() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_initialize()
            .times(1)
            .returning(|_, _, _| Err(GatewayError::Timeout));

        let h = harness_with_gateway(gateway);
        let payment = create_pending(&h).await;

        let err = h.service.initiate_gateway_settlement(payment.id, TENANT, details(500)).await.unwrap_err();
        assert!(matches!(err, AppError::GatewayError(GatewayError::Timeout)));

        let stored = h.payments.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert_eq!(stored.amount, None);
        assert_eq!(stored.gateway_reference, None);
    }

    #[tokio::test]
    async fn test_initiate_gateway_requires_valid_email_and_owner() {
        let h = harness();
        let payment = create_pending(&h).await;

        let no_email = PaymentDetails {
            amount: BigDecimal::from(500),
            email: Some("not-an-email".to_string()),
        };
        let err = h.service.initiate_gateway_settlement(payment.id, TENANT, no_email).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = h.service.initiate_gateway_settlement(payment.id, OTHER_TENANT, details(500)).await.unwrap_err();
        assert!(matches!(err, AppError::ForbiddenError(_)));
    }

    #[tokio::test]
    async fn test_delete_pending_payment_notifies_tenant() {
        let h = harness();
        let payment = create_pending(&h).await;

        let removed = h.service.delete_payment(payment.id, LANDLORD).await.unwrap();
        assert_eq!(removed.id, payment.id);
        assert!(h.payments.find_by_id(payment.id).await.unwrap().is_none());

        let sent = h.sink.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, TENANT);
        assert_eq!(sent[0].1.notification_type, NotificationType::PaymentRemoved);
        assert!(sent[0].1.message.contains("October rent"));
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let h = harness();
        let payment = create_pending(&h).await;

        let err = h.service.delete_payment(payment.id, OTHER_LANDLORD).await.unwrap_err();
        assert!(matches!(err, AppError::ForbiddenError(_)));

        h.service.process_direct(payment.id, TENANT, details(500)).await.unwrap();
        let err = h.service.delete_payment(payment.id, LANDLORD).await.unwrap_err();
        assert!(matches!(err, AppError::ConflictError(_)));
        assert!(h.payments.find_by_id(payment.id).await.unwrap().is_some());

        let err = h.service.delete_payment(Uuid::new_v4(), LANDLORD).await.unwrap_err();
        assert!(matches!(err, AppError::NotFoundError(_)));
    }

    #[tokio::test]
    async fn test_update_payment_only_while_pending() {
        let h = harness();
        let payment = create_pending(&h).await;

        let request = UpdatePaymentRequest {
            amount: Some(BigDecimal::from(800)),
            apartment: Some("Unit 7".to_string()),
            ..Default::default()
        };
        let updated = h.service.update_payment(payment.id, LANDLORD, request.clone()).await.unwrap();
        assert_eq!(updated.amount, Some(BigDecimal::from(800)));
        assert_eq!(updated.apartment.as_deref(), Some("Unit 7"));
        assert_eq!(updated.status, PaymentStatus::Pending);

        let foreign_lease = UpdatePaymentRequest {
            lease_id: Some(OTHER_LEASE),
            ..Default::default()
        };
        let err = h.service.update_payment(payment.id, LANDLORD, foreign_lease).await.unwrap_err();
        assert!(matches!(err, AppError::ForbiddenError(_)));

        h.service.process_direct(payment.id, TENANT, details(800)).await.unwrap();
        let err = h.service.update_payment(payment.id, LANDLORD, request).await.unwrap_err();
        assert!(matches!(err, AppError::ConflictError(_)));
    }

    #[tokio::test]
    async fn test_gateway_failure_notifies_tenant_once() {
        let payments = InMemoryPaymentStore::new();
        let seed = harness();
        let payment = create_pending(&seed).await;
        payments.put(payment.clone()).await;

        let mut sink = MockNotificationSink::new();
        sink.expect_send()
            .withf(|recipient, message| {
                *recipient == TENANT && message.notification_type == NotificationType::PaymentFailed
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let service = PaymentService::new(
            Arc::new(payments.clone()),
            Arc::new(payments.ledger()),
            Arc::new(InMemoryLeases::with(&[(LEASE, LANDLORD)])),
            Arc::new(sink),
            Arc::new(MockPaymentGateway::new()),
        );

        let failed = service.fail_from_gateway(&payment, "declined").await.unwrap();
        assert_eq!(failed.map(|p| p.status), Some(PaymentStatus::Failed));

        // Sudah terminal: tidak ada notifikasi kedua
        assert!(service.fail_from_gateway(&payment, "declined").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_access_limited_to_parties() {
        let h = harness();
        let payment = create_pending(&h).await;
        h.service.process_direct(payment.id, TENANT, details(500)).await.unwrap();

        assert!(h.service.get_payment(payment.id, &user(TENANT, Role::Tenant)).await.is_ok());
        assert!(h.service.get_payment(payment.id, &user(LANDLORD, Role::Landlord)).await.is_ok());

        let err = h.service.get_payment(payment.id, &user(OTHER_TENANT, Role::Tenant)).await.unwrap_err();
        assert!(matches!(err, AppError::ForbiddenError(_)));

        let err = h.service.get_transaction(payment.id, &user(OTHER_LANDLORD, Role::Landlord)).await.unwrap_err();
        assert!(matches!(err, AppError::ForbiddenError(_)));

        let tenant_ledger = h.service.list_transactions(&user(TENANT, Role::Tenant)).await.unwrap();
        assert_eq!(tenant_ledger.len(), 1);
        let landlord_payments = h.service.list_payments(&user(LANDLORD, Role::Landlord)).await.unwrap();
        assert_eq!(landlord_payments.len(), 1);
        assert!(h.service.list_payments(&user(OTHER_TENANT, Role::Tenant)).await.unwrap().is_empty());
    }
}
