use crate::domain::transaction::Transaction;
use crate::error::AppResult;
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Transaction Ledger, read side.
///
/// Entry ditulis oleh `PaymentStore::settle_if_pending` di transaksi database yang sama
/// dengan perubahan status.
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Transaction>>;

    async fn list_for_tenant(&self, tenant_id: i32) -> AppResult<Vec<Transaction>>;

    async fn list_for_landlord(&self, landlord_id: i32) -> AppResult<Vec<Transaction>>;
}

// Repository untuk tabel transactions
#[derive(Clone)]
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Tulis entry keyed by payment id di dalam transaksi caller.
    /// `false` kalau entry untuk id itu sudah ada.
    pub async fn insert_entry(conn: &mut PgConnection, transaction: &Transaction) -> AppResult<bool> {
        // Primary key (id) adalah guard de-duplikasi
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (
                id, reference, tenant_id, landlord_id, lease_id,
                name, apartment, amount, payment_date, status,
                transaction_type, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(transaction.id)
        .bind(&transaction.reference)
        .bind(transaction.tenant_id)
        .bind(transaction.landlord_id)
        .bind(transaction.lease_id)
        .bind(&transaction.name)
        .bind(&transaction.apartment)
        .bind(&transaction.amount)
        .bind(transaction.payment_date)
        .bind(transaction.status.as_str())
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl TransactionLedger for TransactionRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn list_for_tenant(&self, tenant_id: i32) -> AppResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE tenant_id = $1 ORDER BY payment_date DESC LIMIT 200",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_for_landlord(&self, landlord_id: i32) -> AppResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE landlord_id = $1 ORDER BY payment_date DESC LIMIT 200",
        )
        .bind(landlord_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
