//! Outbound payment gateway seam used by the disbursement dispatcher.
//!
//! The dispatcher only needs to know whether a B2C push was accepted for
//! processing. Settlement arrives later as an ordinary inbound M-Pesa payment,
//! so nothing here waits on completion.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

/// A business-to-customer payout request
#[derive(Debug, Clone, PartialEq)]
pub struct B2cRequest {
    /// `2547XXXXXXXX`
    pub phone: String,
    /// Whole shillings
    pub amount: u64,
    /// Shown to the customer, `LOAN{id}`
    pub account_reference: String,
    pub originator_conversation_id: String,
    pub remarks: String,
}

impl B2cRequest {
    /// Build a payout for a loan. M-Pesa only moves whole shillings, so the
    /// amount is rounded up.
    pub fn for_loan(loan_id: i64, phone: String, amount: Decimal) -> Self {
        let whole = amount.ceil().to_u64().unwrap_or(0);
        Self {
            phone,
            amount: whole,
            account_reference: format!("LOAN{}", loan_id),
            originator_conversation_id: uuid::Uuid::new_v4().to_string(),
            remarks: format!("Loan disbursement {}", loan_id),
        }
    }
}

/// Gateway acknowledgement that a payout was accepted for processing
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayAcceptance {
    pub conversation_id: String,
    pub originator_conversation_id: String,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway rejected the request ({code}): {description}")]
    Rejected { code: String, description: String },

    #[error("gateway authentication failed: {0}")]
    Authentication(String),

    #[error("gateway unreachable: {0}")]
    Transport(String),
}

#[async_trait]
pub trait DisbursementGateway: Send + Sync {
    async fn send_b2c(&self, request: &B2cRequest) -> Result<GatewayAcceptance, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_b2c_request_rounds_up_to_whole_shillings() {
        let request = B2cRequest::for_loan(
            7,
            "254712345678".to_string(),
            Decimal::from_str("10000.40").unwrap(),
        );
        assert_eq!(request.amount, 10_001);
        assert_eq!(request.account_reference, "LOAN7");
        assert!(!request.originator_conversation_id.is_empty());

        let exact = B2cRequest::for_loan(7, "254712345678".to_string(), Decimal::from(5_000));
        assert_eq!(exact.amount, 5_000);
    }
}
