use crate::domain::notification::{Notification, NotificationMessage};
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

/// Notification Sink, fire-and-forget ke satu user.
///
/// Caller tidak boleh membatalkan perubahan status kalau `send` gagal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, recipient_id: i32, message: &NotificationMessage) -> AppResult<()>;
}

// Tulis notifikasi ke tabel `notifications`, dibaca oleh notification service
#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for NotificationRepository {
    async fn send(&self, recipient_id: i32, message: &NotificationMessage) -> AppResult<()> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (
                user_id, notification_type, title, message,
                related_id, related_type, is_read, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7)
            RETURNING *
            "#,
        )
        .bind(recipient_id)
        .bind(message.notification_type.as_str())
        .bind(&message.title)
        .bind(&message.message)
        .bind(message.related_id)
        .bind(message.related_id.map(|_| "payment"))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            "Notification queued: id={}, user_id={}, type={}",
            notification.id,
            notification.user_id,
            notification.notification_type.as_str()
        );

        Ok(())
    }
}
