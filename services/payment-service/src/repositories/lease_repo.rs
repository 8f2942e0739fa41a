use crate::error::AppResult;
use async_trait::async_trait;
use sqlx::PgPool;

/// Read-only view ke tabel leases (CRUD lease dikelola service lain)
#[async_trait]
pub trait LeaseDirectory: Send + Sync {
    async fn landlord_id(&self, lease_id: i32) -> AppResult<Option<i32>>;
}

#[derive(Clone)]
pub struct LeaseRepository {
    pool: PgPool,
}

impl LeaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaseDirectory for LeaseRepository {
    async fn landlord_id(&self, lease_id: i32) -> AppResult<Option<i32>> {
        let landlord_id = sqlx::query_scalar::<_, i32>("SELECT landlord_id FROM leases WHERE id = $1")
            .bind(lease_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(landlord_id)
    }
}
