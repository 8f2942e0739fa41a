use crate::domain::payment::{NewPayment, Payment, PaymentChanges, PaymentStatus, Settlement};
use crate::domain::transaction::Transaction;
use crate::error::{AppError, AppResult};
use crate::repositories::transaction_repo::TransactionRepository;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Payment Record Store.
///
/// Semua transisi status adalah compare-and-set terhadap `pending`: method `*_if_pending`
/// mengembalikan `None` kalau row sudah terminal (atau tidak ada), sehingga dua request
/// yang balapan untuk payment yang sama hanya satu yang menang.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: &NewPayment) -> AppResult<Payment>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Payment>>;

    async fn reference_exists(&self, reference: &str) -> AppResult<bool>;

    async fn list_for_tenant(&self, tenant_id: i32) -> AppResult<Vec<Payment>>;

    async fn list_for_landlord(&self, landlord_id: i32) -> AppResult<Vec<Payment>>;

    /// Payment pending yang sudah punya gateway reference dan tidak berubah sejak `older_than`.
    async fn list_stale_pending(&self, older_than: DateTime<Utc>, limit: i64) -> AppResult<Vec<Payment>>;

    async fn update_details_if_pending(&self, id: Uuid, changes: &PaymentChanges) -> AppResult<Option<Payment>>;

    /// Simpan hasil checkout gateway. Status tetap `pending`.
    async fn attach_gateway_if_pending(
        &self,
        id: Uuid,
        amount: &BigDecimal,
        landlord_id: i32,
        gateway_reference: &str,
    ) -> AppResult<Option<Payment>>;

    /// `pending -> completed` plus entry ledger untuk payment yang sama, commit bersama
    /// atau tidak sama sekali.
    async fn settle_if_pending(&self, id: Uuid, settlement: &Settlement) -> AppResult<Option<Payment>>;

    async fn fail_if_pending(&self, id: Uuid) -> AppResult<Option<Payment>>;

    /// Hapus row selama masih pending, mengembalikan snapshot terakhir.
    async fn delete_if_pending(&self, id: Uuid) -> AppResult<Option<Payment>>;
}

// Repository untuk operasi database payment
#[derive(Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    // Buat payment repository baru
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PENDING: &str = "pending";

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn insert(&self, payment: &NewPayment) -> AppResult<Payment> {
        let row = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                id, reference, tenant_id, landlord_id, lease_id,
                amount, status, payment_type, name, apartment,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *
            "#,
        )
        .bind(payment.id)
        .bind(&payment.reference)
        .bind(payment.tenant_id)
        .bind(payment.landlord_id)
        .bind(payment.lease_id)
        .bind(&payment.amount)
        .bind(PaymentStatus::Pending.as_str())
        .bind(payment.payment_type.as_str())
        .bind(&payment.name)
        .bind(&payment.apartment)
        .bind(payment.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Payment>> {
        let row = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn reference_exists(&self, reference: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM payments WHERE reference = $1)",
        )
        .bind(reference)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn list_for_tenant(&self, tenant_id: i32) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE tenant_id = $1 ORDER BY created_at DESC LIMIT 200",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_for_landlord(&self, landlord_id: i32) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE landlord_id = $1 ORDER BY created_at DESC LIMIT 200",
        )
        .bind(landlord_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_stale_pending(&self, older_than: DateTime<Utc>, limit: i64) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE status = $1
              AND gateway_reference IS NOT NULL
              AND updated_at < $2
            ORDER BY updated_at ASC
            LIMIT $3
            "#,
        )
        .bind(PENDING)
        .bind(older_than)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn update_details_if_pending(&self, id: Uuid, changes: &PaymentChanges) -> AppResult<Option<Payment>> {
        let row = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET amount = COALESCE($2, amount),
                lease_id = COALESCE($3, lease_id),
                landlord_id = COALESCE($4, landlord_id),
                payment_type = COALESCE($5, payment_type),
                name = COALESCE($6, name),
                apartment = COALESCE($7, apartment),
                updated_at = $8
            WHERE id = $1 AND status = $9
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.amount)
        .bind(changes.lease_id)
        .bind(changes.landlord_id)
        .bind(changes.payment_type.map(|t| t.as_str()))
        .bind(&changes.name)
        .bind(&changes.apartment)
        .bind(Utc::now())
        .bind(PENDING)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn attach_gateway_if_pending(
        &self,
        id: Uuid,
        amount: &BigDecimal,
        landlord_id: i32,
        gateway_reference: &str,
    ) -> AppResult<Option<Payment>> {
        let row = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET amount = $2,
                landlord_id = $3,
                gateway_reference = $4,
                updated_at = $5
            WHERE id = $1 AND status = $6
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(amount)
        .bind(landlord_id)
        .bind(gateway_reference)
        .bind(Utc::now())
        .bind(PENDING)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn settle_if_pending(&self, id: Uuid, settlement: &Settlement) -> AppResult<Option<Payment>> {
        let mut tx = self.pool.begin().await?;

        let completed = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2,
                amount = $3,
                landlord_id = $4,
                payment_date = $5,
                updated_at = $5
            WHERE id = $1 AND status = $6
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(PaymentStatus::Completed.as_str())
        .bind(&settlement.amount)
        .bind(settlement.landlord_id)
        .bind(settlement.payment_date)
        .bind(PENDING)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(completed) = completed else {
            tx.rollback().await?;
            return Ok(None);
        };

        let entry = Transaction::from_settled_payment(&completed)
            .ok_or_else(|| AppError::internal(format!("Payment {} has no settlement data", completed.id)))?;

        // Gagal di sini = rollback, payment tetap pending dan retry gateway masih berlaku
        if !TransactionRepository::insert_entry(&mut *tx, &entry).await? {
            tracing::warn!("Ledger entry already existed: payment_id={}", completed.id);
        }

        tx.commit().await?;

        Ok(Some(completed))
    }

    async fn fail_if_pending(&self, id: Uuid) -> AppResult<Option<Payment>> {
        let row = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2,
                updated_at = $3
            WHERE id = $1 AND status = $4
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(PaymentStatus::Failed.as_str())
        .bind(Utc::now())
        .bind(PENDING)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn delete_if_pending(&self, id: Uuid) -> AppResult<Option<Payment>> {
        let row = sqlx::query_as::<_, Payment>(
            "DELETE FROM payments WHERE id = $1 AND status = $2 RETURNING *",
        )
        .bind(id)
        .bind(PENDING)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
