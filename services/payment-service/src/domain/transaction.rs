use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::payment::{Payment, PaymentStatus, PaymentType};

/// Ledger entry immutable, satu-satu dengan payment yang completed.
///
/// `id` sama dengan id payment; primary key di tabel `transactions` yang
/// menjamin ledger hanya ditulis sekali per payment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema, PartialEq)]
pub struct Transaction {
    pub id: Uuid,
    pub reference: String,
    pub tenant_id: i32,
    pub landlord_id: i32,
    pub lease_id: i32,
    pub name: Option<String>,
    pub apartment: Option<String>,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub payment_date: DateTime<Utc>,
    pub status: TransactionStatus,
    pub transaction_type: TransactionType,
    pub created_at: DateTime<Utc>,
}

// Transaction type enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    RentPayment,
    DepositPayment,
    FeePayment,
}

impl From<PaymentType> for TransactionType {
    fn from(payment_type: PaymentType) -> Self {
        match payment_type {
            PaymentType::Rent => TransactionType::RentPayment,
            PaymentType::Deposit => TransactionType::DepositPayment,
            PaymentType::Fee => TransactionType::FeePayment,
        }
    }
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::RentPayment => "rent_payment",
            TransactionType::DepositPayment => "deposit_payment",
            TransactionType::FeePayment => "fee_payment",
        }
    }
}

// Ledger hanya mencatat payment sukses; failed tidak pernah punya row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
        }
    }
}

impl Transaction {
    /// Snapshot denormalized dari payment yang baru saja completed.
    ///
    /// `None` kalau payment belum completed atau data settlement belum lengkap.
    pub fn from_settled_payment(payment: &Payment) -> Option<Self> {
        if payment.status != PaymentStatus::Completed {
            return None;
        }

        Some(Self {
            id: payment.id,
            reference: payment.reference.clone(),
            tenant_id: payment.tenant_id,
            landlord_id: payment.landlord_id,
            lease_id: payment.lease_id,
            name: payment.name.clone(),
            apartment: payment.apartment.clone(),
            amount: payment.amount.clone()?,
            payment_date: payment.payment_date?,
            status: TransactionStatus::Completed,
            transaction_type: payment.payment_type.into(),
            created_at: Utc::now(),
        })
    }
}
