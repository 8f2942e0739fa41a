// Modul domain untuk Payment Service
pub mod gateway;
pub mod notification;
pub mod payment;
pub mod transaction;
