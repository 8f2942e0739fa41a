//! In-memory implementations of the store traits, used by unit tests.
//!
//! Each store keeps its rows behind a single `tokio::sync::Mutex`, so the
//! `*_if_pending` methods are atomic in the same way the guarded SQL updates are.
//! The payment store writes ledger entries into its own `InMemoryLedger`, the way
//! the Postgres store writes both rows in one transaction.

use crate::domain::notification::NotificationMessage;
use crate::domain::payment::{NewPayment, Payment, PaymentChanges, PaymentStatus, Settlement};
use crate::domain::transaction::Transaction;
use crate::error::{AppError, AppResult};
use crate::repositories::{LeaseDirectory, NotificationSink, PaymentStore, TransactionLedger};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<Mutex<HashMap<Uuid, Payment>>>,
    ledger: InMemoryLedger,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger yang ditulis oleh `settle_if_pending` store ini.
    pub fn ledger(&self) -> InMemoryLedger {
        self.ledger.clone()
    }

    /// Seed row langsung, melewati orchestrator.
    pub async fn put(&self, payment: Payment) {
        self.payments.lock().await.insert(payment.id, payment);
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, new: &NewPayment) -> AppResult<Payment> {
        let mut payments = self.payments.lock().await;
        if payments.values().any(|p| p.reference == new.reference) {
            return Err(AppError::internal("duplicate payment reference"));
        }

        let payment = Payment {
            id: new.id,
            reference: new.reference.clone(),
            tenant_id: new.tenant_id,
            landlord_id: new.landlord_id,
            lease_id: new.lease_id,
            amount: new.amount.clone(),
            status: PaymentStatus::Pending,
            payment_type: new.payment_type,
            name: new.name.clone(),
            apartment: new.apartment.clone(),
            gateway_reference: None,
            payment_date: None,
            created_at: new.created_at,
            updated_at: new.created_at,
        };
        payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Payment>> {
        Ok(self.payments.lock().await.get(&id).cloned())
    }

    async fn reference_exists(&self, reference: &str) -> AppResult<bool> {
        Ok(self.payments.lock().await.values().any(|p| p.reference == reference))
    }

    async fn list_for_tenant(&self, tenant_id: i32) -> AppResult<Vec<Payment>> {
        let payments = self.payments.lock().await;
        let mut rows: Vec<Payment> = payments.values().filter(|p| p.tenant_id == tenant_id).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_for_landlord(&self, landlord_id: i32) -> AppResult<Vec<Payment>> {
        let payments = self.payments.lock().await;
        let mut rows: Vec<Payment> = payments.values().filter(|p| p.landlord_id == landlord_id).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_stale_pending(&self, older_than: DateTime<Utc>, limit: i64) -> AppResult<Vec<Payment>> {
        let payments = self.payments.lock().await;
        let mut rows: Vec<Payment> = payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending && p.gateway_reference.is_some() && p.updated_at < older_than)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn update_details_if_pending(&self, id: Uuid, changes: &PaymentChanges) -> AppResult<Option<Payment>> {
        let mut payments = self.payments.lock().await;
        let Some(payment) = payments.get_mut(&id).filter(|p| p.status == PaymentStatus::Pending) else {
            return Ok(None);
        };

        if let Some(amount) = &changes.amount {
            payment.amount = Some(amount.clone());
        }
        if let Some(lease_id) = changes.lease_id {
            payment.lease_id = lease_id;
        }
        if let Some(landlord_id) = changes.landlord_id {
            payment.landlord_id = landlord_id;
        }
        if let Some(payment_type) = changes.payment_type {
            payment.payment_type = payment_type;
        }
        if let Some(name) = &changes.name {
            payment.name = Some(name.clone());
        }
        if let Some(apartment) = &changes.apartment {
            payment.apartment = Some(apartment.clone());
        }
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }

    async fn attach_gateway_if_pending(
        &self,
        id: Uuid,
        amount: &BigDecimal,
        landlord_id: i32,
        gateway_reference: &str,
    ) -> AppResult<Option<Payment>> {
        let mut payments = self.payments.lock().await;
        let Some(payment) = payments.get_mut(&id).filter(|p| p.status == PaymentStatus::Pending) else {
            return Ok(None);
        };

        payment.amount = Some(amount.clone());
        payment.landlord_id = landlord_id;
        payment.gateway_reference = Some(gateway_reference.to_string());
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }

    async fn settle_if_pending(&self, id: Uuid, settlement: &Settlement) -> AppResult<Option<Payment>> {
        let mut payments = self.payments.lock().await;
        let Some(payment) = payments.get_mut(&id).filter(|p| p.status == PaymentStatus::Pending) else {
            return Ok(None);
        };

        let mut completed = payment.clone();
        completed.status = PaymentStatus::Completed;
        completed.amount = Some(settlement.amount.clone());
        completed.landlord_id = settlement.landlord_id;
        completed.payment_date = Some(settlement.payment_date);
        completed.updated_at = settlement.payment_date;

        let entry = Transaction::from_settled_payment(&completed)
            .ok_or_else(|| AppError::internal("settled payment without ledger data"))?;

        // Ledger gagal: row payment tidak disentuh
        self.ledger.append(&entry).await?;

        *payment = completed.clone();
        Ok(Some(completed))
    }

    async fn fail_if_pending(&self, id: Uuid) -> AppResult<Option<Payment>> {
        let mut payments = self.payments.lock().await;
        let Some(payment) = payments.get_mut(&id).filter(|p| p.status == PaymentStatus::Pending) else {
            return Ok(None);
        };

        payment.status = PaymentStatus::Failed;
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }

    async fn delete_if_pending(&self, id: Uuid) -> AppResult<Option<Payment>> {
        let mut payments = self.payments.lock().await;
        if payments.get(&id).is_some_and(|p| p.status == PaymentStatus::Pending) {
            return Ok(payments.remove(&id));
        }
        Ok(None)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryLedger {
    transactions: Arc<Mutex<HashMap<Uuid, Transaction>>>,
    fail_next: Arc<AtomicBool>,
}

impl InMemoryLedger {
    /// Write berikutnya gagal sekali, seperti insert yang ditolak database.
    pub fn fail_next_write(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    async fn append(&self, transaction: &Transaction) -> AppResult<bool> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AppError::internal("ledger write failed"));
        }

        let mut transactions = self.transactions.lock().await;
        if transactions.contains_key(&transaction.id) {
            return Ok(false);
        }
        transactions.insert(transaction.id, transaction.clone());
        Ok(true)
    }

    pub async fn count_for(&self, id: Uuid) -> usize {
        usize::from(self.transactions.lock().await.contains_key(&id))
    }

    pub async fn len(&self) -> usize {
        self.transactions.lock().await.len()
    }
}

#[async_trait]
impl TransactionLedger for InMemoryLedger {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Transaction>> {
        Ok(self.transactions.lock().await.get(&id).cloned())
    }

    async fn list_for_tenant(&self, tenant_id: i32) -> AppResult<Vec<Transaction>> {
        let transactions = self.transactions.lock().await;
        Ok(transactions.values().filter(|t| t.tenant_id == tenant_id).cloned().collect())
    }

    async fn list_for_landlord(&self, landlord_id: i32) -> AppResult<Vec<Transaction>> {
        let transactions = self.transactions.lock().await;
        Ok(transactions.values().filter(|t| t.landlord_id == landlord_id).cloned().collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryLeases {
    leases: Arc<Mutex<HashMap<i32, i32>>>,
}

impl InMemoryLeases {
    pub fn with(leases: &[(i32, i32)]) -> Self {
        Self {
            leases: Arc::new(Mutex::new(leases.iter().copied().collect())),
        }
    }
}

#[async_trait]
impl LeaseDirectory for InMemoryLeases {
    async fn landlord_id(&self, lease_id: i32) -> AppResult<Option<i32>> {
        Ok(self.leases.lock().await.get(&lease_id).copied())
    }
}

/// Sink yang merekam semua pesan; bisa diset gagal untuk uji fire-and-forget.
#[derive(Default, Clone)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<(i32, NotificationMessage)>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<(i32, NotificationMessage)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, recipient_id: i32, message: &NotificationMessage) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::internal("notification store unavailable"));
        }
        self.sent.lock().await.push((recipient_id, message.clone()));
        Ok(())
    }
}
