// Handler modules untuk Payment Service
pub mod payment_handler;
pub mod paystack_service;
pub mod transaction_handler;
pub mod webhook_handler;
