use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Metadata korelasi yang dititipkan ke gateway dan dikembalikan di callback
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMetadata {
    pub payment_id: Option<String>,
}

// Request initialize transaction ke Paystack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeTransactionRequest {
    pub email: String,
    // Minor unit (kobo/sen)
    pub amount: i64,
    pub reference: String,
    pub callback_url: String,
    pub metadata: PaymentMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeTransactionData {
    pub authorization_url: Option<String>,
    pub access_code: Option<String>,
    pub reference: Option<String>,
}

// Response dari Paystack initialize
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeTransactionResponse {
    pub status: bool,
    pub message: Option<String>,
    pub data: Option<InitializeTransactionData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTransactionData {
    pub status: String,
    pub reference: String,
    pub amount: Option<i64>,
    pub metadata: Option<PaymentMetadata>,
}

// Response dari Paystack verify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyTransactionResponse {
    pub status: bool,
    pub message: Option<String>,
    pub data: Option<VerifyTransactionData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackData {
    pub status: Option<String>,
    pub reference: Option<String>,
    pub amount: Option<i64>,
    pub metadata: Option<PaymentMetadata>,
}

// Payload webhook dari Paystack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub event: Option<String>,
    pub data: CallbackData,
}

/// Hasil initialize yang dipakai orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayInitialization {
    pub authorization_url: String,
    pub reference: String,
}

/// Outcome yang dilaporkan gateway untuk satu transaksi
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    Success,
    Failed(String),
}

impl GatewayOutcome {
    /// Callback: hanya `success` yang dianggap berhasil, status lain berarti gagal.
    pub fn from_callback_status(status: &str) -> Self {
        if status.eq_ignore_ascii_case("success") {
            GatewayOutcome::Success
        } else {
            GatewayOutcome::Failed(status.to_lowercase())
        }
    }

    /// Verify: `None` untuk status yang belum final (pending, ongoing, ...).
    pub fn from_verify_status(status: &str) -> Option<Self> {
        match status.to_lowercase().as_str() {
            "success" => Some(GatewayOutcome::Success),
            other @ ("failed" | "abandoned" | "reversed") => Some(GatewayOutcome::Failed(other.to_string())),
            _ => None,
        }
    }
}

/// Callback yang sudah di-parse dan punya payment id yang valid
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCallback {
    pub payment_id: Uuid,
    pub outcome: GatewayOutcome,
    pub reference: Option<String>,
    pub amount_minor: Option<i64>,
}
