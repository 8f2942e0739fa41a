use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// Model data payment sewa, satu row per kewajiban bayar
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub reference: String,

    // Parties & lease
    pub tenant_id: i32,
    pub landlord_id: i32,
    pub lease_id: i32,

    // Amount bisa kosong sampai tenant memproses pembayaran
    #[schema(value_type = Option<String>)]
    pub amount: Option<BigDecimal>,

    pub status: PaymentStatus,
    pub payment_type: PaymentType,

    // Label tampilan saja, bukan identifier
    pub name: Option<String>,
    pub apartment: Option<String>,

    // Reference transaksi di gateway, diisi saat checkout berhasil diinisialisasi
    pub gateway_reference: Option<String>,

    pub payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status payment. Hanya boleh bergerak `Pending -> Completed | Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Jenis kewajiban bayar
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    #[default]
    Rent,
    Deposit,
    Fee,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Rent => "rent",
            PaymentType::Deposit => "deposit",
            PaymentType::Fee => "fee",
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Request buat payment baru (tenant atau landlord)
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CreatePaymentRequest {
    pub tenant_id: Option<i32>,
    pub landlord_id: Option<i32>,
    pub lease_id: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub amount: Option<BigDecimal>,
    #[serde(default)]
    pub payment_type: PaymentType,
    pub name: Option<String>,
    pub apartment: Option<String>,
}

// Request update payment oleh landlord (PUT), hanya selama pending
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UpdatePaymentRequest {
    #[schema(value_type = Option<String>)]
    pub amount: Option<BigDecimal>,
    pub lease_id: Option<i32>,
    pub payment_type: Option<PaymentType>,
    pub name: Option<String>,
    pub apartment: Option<String>,
}

// Detail pembayaran dari tenant, dipakai oleh direct process dan checkout gateway
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PaymentDetails {
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    // Wajib untuk checkout gateway, diabaikan pada direct process
    pub email: Option<String>,
}

/// Row baru yang sudah lolos validasi, siap di-insert.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub id: Uuid,
    pub reference: String,
    pub tenant_id: i32,
    pub landlord_id: i32,
    pub lease_id: i32,
    pub amount: Option<BigDecimal>,
    pub payment_type: PaymentType,
    pub name: Option<String>,
    pub apartment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Perubahan yang sudah divalidasi untuk `update_details_if_pending`.
#[derive(Debug, Clone, Default)]
pub struct PaymentChanges {
    pub amount: Option<BigDecimal>,
    pub lease_id: Option<i32>,
    pub landlord_id: Option<i32>,
    pub payment_type: Option<PaymentType>,
    pub name: Option<String>,
    pub apartment: Option<String>,
}

/// Data yang diterapkan bersamaan dengan transisi `pending -> completed`.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub amount: BigDecimal,
    pub landlord_id: i32,
    pub payment_date: DateTime<Utc>,
}

// Response checkout gateway
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CheckoutResponse {
    pub payment_id: Uuid,
    pub authorization_url: String,
    pub gateway_reference: String,
    pub status: PaymentStatus,
}

// Response webhook untuk gateway
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
}

// Business logic methods
impl Payment {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Cek apakah user adalah tenant atau landlord dari payment ini
    pub fn involves(&self, user_id: i32) -> bool {
        self.tenant_id == user_id || self.landlord_id == user_id
    }

    /// Laporan gateway hanya berlaku untuk checkout terakhir yang tercatat.
    pub fn matches_checkout(&self, gateway_reference: Option<&str>) -> bool {
        match (self.gateway_reference.as_deref(), gateway_reference) {
            (Some(current), Some(reported)) => current == reported,
            _ => false,
        }
    }

    /// Generate reference human-readable, suffix random 8 karakter.
    ///
    /// Keunikan dijamin oleh retry terhadap store, bukan oleh generator.
    pub fn generate_reference() -> String {
        let date = Utc::now().format("%Y%m%d");
        let suffix = Alphanumeric.sample_string(&mut rand::rng(), 8).to_uppercase();
        format!("RENT-{}-{}", date, suffix)
    }

    /// Label untuk pesan notifikasi
    pub fn display_label(&self) -> String {
        match (&self.name, &self.apartment) {
            (Some(name), Some(apartment)) => format!("{} ({})", name, apartment),
            (Some(name), None) => name.clone(),
            (None, Some(apartment)) => format!("{} payment for {}", self.payment_type, apartment),
            (None, None) => format!("{} payment {}", self.payment_type, self.reference),
        }
    }
}
