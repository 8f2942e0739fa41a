use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::payment::Payment;

// Model notification di tabel `notifications` (dibaca oleh notification service)
#[derive(Debug, Clone, FromRow, Serialize, utoipa::ToSchema)]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub related_id: Option<Uuid>,
    pub related_type: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    PaymentCompleted,
    PaymentReceived,
    PaymentFailed,
    PaymentRemoved,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::PaymentCompleted => "payment_completed",
            NotificationType::PaymentReceived => "payment_received",
            NotificationType::PaymentFailed => "payment_failed",
            NotificationType::PaymentRemoved => "payment_removed",
        }
    }
}

/// Pesan yang dikirim ke NotificationSink
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub related_id: Option<Uuid>,
}

impl NotificationMessage {
    // Untuk tenant: pembayaran berhasil
    pub fn payment_completed(payment: &Payment) -> Self {
        Self {
            notification_type: NotificationType::PaymentCompleted,
            title: "Payment successful".to_string(),
            message: format!(
                "Your payment of {} for {} was completed.",
                format_amount(payment),
                payment.display_label()
            ),
            related_id: Some(payment.id),
        }
    }

    // Untuk landlord: dana diterima
    pub fn payment_received(payment: &Payment) -> Self {
        Self {
            notification_type: NotificationType::PaymentReceived,
            title: "Payment received".to_string(),
            message: format!(
                "A payment of {} for {} has been received.",
                format_amount(payment),
                payment.display_label()
            ),
            related_id: Some(payment.id),
        }
    }

    // Untuk tenant: gateway melaporkan gagal
    pub fn payment_failed(payment: &Payment) -> Self {
        Self {
            notification_type: NotificationType::PaymentFailed,
            title: "Payment failed".to_string(),
            message: format!(
                "Your payment for {} could not be completed. Please try again.",
                payment.display_label()
            ),
            related_id: Some(payment.id),
        }
    }

    /// Untuk tenant: landlord menghapus payment. Snapshot diambil sebelum row hilang,
    /// jadi `related_id` sengaja kosong.
    pub fn payment_removed(payment: &Payment) -> Self {
        Self {
            notification_type: NotificationType::PaymentRemoved,
            title: "Payment removed".to_string(),
            message: format!(
                "The payment of {} for {} was removed by your landlord.",
                format_amount(payment),
                payment.display_label()
            ),
            related_id: None,
        }
    }
}

fn format_amount(payment: &Payment) -> String {
    payment
        .amount
        .as_ref()
        .map(|amount| amount.with_scale(2).to_string())
        .unwrap_or_else(|| "an unset amount".to_string())
}
