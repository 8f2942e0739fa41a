pub mod claims;

pub use claims::{Role, TokenClaims};
