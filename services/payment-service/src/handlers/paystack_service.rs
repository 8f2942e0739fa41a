use crate::domain::gateway::{
    CallbackPayload, GatewayCallback, GatewayInitialization, GatewayOutcome,
    InitializeTransactionRequest, InitializeTransactionResponse, PaymentMetadata,
    VerifyTransactionResponse,
};
use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha512;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

type HmacSha512 = Hmac<Sha512>;

/// Kegagalan saat bicara dengan gateway.
///
/// `Timeout` dan `Network` terjadi sebelum gateway memberi jawaban, jadi retry aman.
/// `Rejected` dan `Malformed` berarti gateway menjawab tapi jawabannya tidak bisa dipakai.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway unreachable: {0}")]
    Network(String),

    #[error("gateway rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("gateway returned malformed response: {0}")]
    Malformed(String),
}

impl GatewayError {
    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Network(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

// Error saat parsing webhook; tidak pernah dikembalikan ke caller manapun
#[derive(Debug, Error, PartialEq)]
pub enum CallbackError {
    #[error("callback payload is not valid JSON: {0}")]
    InvalidPayload(String),

    #[error("callback payload has no status")]
    MissingStatus,

    #[error("callback metadata has no payment_id")]
    MissingPaymentId,

    #[error("callback payment_id is not a valid id: {0}")]
    InvalidPaymentId(String),
}

/// Adapter ke payment gateway eksternal
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Minta redirect URL untuk satu payment. `payment_id` dititipkan sebagai metadata.
    async fn initialize(
        &self,
        payment_id: Uuid,
        amount: &BigDecimal,
        email: &str,
    ) -> Result<GatewayInitialization, GatewayError>;

    /// Tanya status transaksi by reference. `None` kalau belum final.
    async fn verify(&self, reference: &str) -> Result<Option<GatewayOutcome>, GatewayError>;

    fn parse_callback(&self, raw_payload: &str) -> Result<GatewayCallback, CallbackError>;

    fn verify_signature(&self, raw_payload: &[u8], signature: &str) -> bool;
}

// Service untuk integrasi Paystack
pub struct PaystackService {
    client: Client,
    secret_key: String,
    api_url: String,
    callback_url: String,
}

impl PaystackService {
    // Buat Paystack Service baru dengan timeout outbound yang terbatas
    pub fn new(
        secret_key: String,
        api_url: String,
        callback_url: String,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            secret_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            callback_url,
        })
    }

    /// Reference idempotency unik per panggilan initialize
    fn generate_reference() -> String {
        format!("PSK-{}", Uuid::new_v4().simple())
    }

    // Ambil body error untuk logging tanpa menggagalkan error aslinya
    async fn rejected(response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        GatewayError::Rejected { status, body }
    }
}

#[async_trait]
impl PaymentGateway for PaystackService {
    async fn initialize(
        &self,
        payment_id: Uuid,
        amount: &BigDecimal,
        email: &str,
    ) -> Result<GatewayInitialization, GatewayError> {
        let minor_amount = to_minor_units(amount)
            .ok_or_else(|| GatewayError::Malformed(format!("amount {} not representable in minor units", amount)))?;

        let request = InitializeTransactionRequest {
            email: email.to_string(),
            amount: minor_amount,
            reference: Self::generate_reference(),
            callback_url: self.callback_url.clone(),
            metadata: PaymentMetadata {
                payment_id: Some(payment_id.to_string()),
            },
        };

        let response = self.client
            .post(format!("{}/transaction/initialize", self.api_url))
            .bearer_auth(&self.secret_key)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }

        let body: InitializeTransactionResponse = response.json().await
            .map_err(|e| GatewayError::Malformed(format!("Failed to parse Paystack response: {}", e)))?;

        if !body.status {
            return Err(GatewayError::Malformed(
                body.message.unwrap_or_else(|| "status=false without message".to_string()),
            ));
        }

        let data = body.data
            .ok_or_else(|| GatewayError::Malformed("response has no data".to_string()))?;

        let authorization_url = data.authorization_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| GatewayError::Malformed("response has no authorization_url".to_string()))?;

        tracing::info!(
            "✅ Paystack transaction initialized: payment_id={}, reference={}",
            payment_id, request.reference
        );

        Ok(GatewayInitialization {
            authorization_url,
            reference: data.reference.unwrap_or(request.reference),
        })
    }

    async fn verify(&self, reference: &str) -> Result<Option<GatewayOutcome>, GatewayError> {
        let response = self.client
            .get(format!("{}/transaction/verify/{}", self.api_url, reference))
            .bearer_auth(&self.secret_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejected(response).await);
        }

        let body: VerifyTransactionResponse = response.json().await
            .map_err(|e| GatewayError::Malformed(format!("Failed to parse Paystack response: {}", e)))?;

        let data = body.data
            .ok_or_else(|| GatewayError::Malformed("verify response has no data".to_string()))?;

        Ok(GatewayOutcome::from_verify_status(&data.status))
    }

    fn parse_callback(&self, raw_payload: &str) -> Result<GatewayCallback, CallbackError> {
        parse_callback_payload(raw_payload)
    }

    fn verify_signature(&self, raw_payload: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };

        let Ok(mut mac) = HmacSha512::new_from_slice(self.secret_key.as_bytes()) else {
            return false;
        };
        mac.update(raw_payload);

        // verify_slice membandingkan secara constant-time
        mac.verify_slice(&expected).is_ok()
    }
}

/// Convert amount ke minor unit. Amount dengan lebih dari dua desimal ditolak.
pub fn to_minor_units(amount: &BigDecimal) -> Option<i64> {
    let scaled = amount.clone() * BigDecimal::from(100);
    if !scaled.is_integer() {
        return None;
    }
    scaled.to_i64()
}

/// Parse webhook payload tanpa menebak: payment id wajib ada di metadata.
pub fn parse_callback_payload(raw_payload: &str) -> Result<GatewayCallback, CallbackError> {
    let payload: CallbackPayload = serde_json::from_str(raw_payload)
        .map_err(|e| CallbackError::InvalidPayload(e.to_string()))?;

    let raw_id = payload.data.metadata
        .and_then(|metadata| metadata.payment_id)
        .filter(|id| !id.trim().is_empty())
        .ok_or(CallbackError::MissingPaymentId)?;

    let payment_id = Uuid::parse_str(raw_id.trim())
        .map_err(|_| CallbackError::InvalidPaymentId(raw_id.clone()))?;

    let status = payload.data.status.ok_or(CallbackError::MissingStatus)?;

    Ok(GatewayCallback {
        payment_id,
        outcome: GatewayOutcome::from_callback_status(&status),
        reference: payload.data.reference,
        amount_minor: payload.data.amount,
    })
}

/// Hex HMAC-SHA512 dari body, format header `x-paystack-signature`.
#[cfg(test)]
pub fn sign_payload(secret_key: &str, raw_payload: &[u8]) -> String {
    let mut mac = HmacSha512::new_from_slice(secret_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(raw_payload);
    hex::encode(mac.finalize().into_bytes())
}
