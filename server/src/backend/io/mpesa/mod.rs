//! # M-Pesa Gateway Adapters
//!
//! Implementations of `DisbursementGateway` for B2C payouts.
//!
//! - **daraja**: the Safaricom Daraja HTTP API (OAuth token, then payment request)
//! - **simulated**: accepts every payout locally, for development and demos
//!
//! Which one the server uses is picked by `MPESA_MODE`.

pub mod daraja;
pub mod simulated;

use std::sync::Arc;

use crate::backend::domain::DisbursementGateway;
use crate::config::MpesaMode;

pub use daraja::DarajaGateway;
pub use simulated::SimulatedGateway;

/// Build the gateway the configuration asks for
pub fn gateway_for(mode: &MpesaMode) -> Arc<dyn DisbursementGateway> {
    match mode {
        MpesaMode::Simulated => Arc::new(SimulatedGateway::new()),
        MpesaMode::Daraja(config) => Arc::new(DarajaGateway::new(config.clone())),
    }
}
