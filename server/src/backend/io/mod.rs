//! # IO Module
//!
//! Adapters between the loan engine and the outside world.
//!
//! - **rest**: the axum REST API used by the back-office UI
//! - **mpesa**: outbound B2C payouts through Safaricom Daraja, or a local simulation

pub mod mpesa;
pub mod rest;
