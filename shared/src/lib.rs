// Shared library untuk semua RentHub services
pub mod models;
pub mod utils;
