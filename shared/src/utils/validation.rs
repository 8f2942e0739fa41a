use bigdecimal::{BigDecimal, Zero};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex valid");
}

// Batas atas satu pembayaran sewa
const MAX_PAYMENT_AMOUNT: i64 = 1_000_000_000;

// Panjang maksimum label tampilan (nama, unit apartemen)
pub const MAX_LABEL_LEN: usize = 120;

// Validate format email
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Amount harus positif, paling banyak dua digit desimal, dan di bawah batas atas.
pub fn is_valid_amount(amount: &BigDecimal) -> bool {
    if *amount <= BigDecimal::zero() || *amount > BigDecimal::from(MAX_PAYMENT_AMOUNT) {
        return false;
    }

    let (_, scale) = amount.normalized().as_bigint_and_exponent();
    scale <= 2
}

// Sanitize string untuk prevent XSS
pub fn sanitize_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Trim + sanitize label tampilan. `None` kalau kosong atau terlalu panjang.
pub fn clean_label(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_LABEL_LEN {
        return None;
    }
    Some(sanitize_html(trimmed))
}
